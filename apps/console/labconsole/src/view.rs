//! What an operator would see, condensed to a few fields.
//!
//! The console has no widgets; instead it logs a line whenever one of these
//! fields changes.

use client_core::state::AppState;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewSummary {
    pub network_connected: bool,
    pub connection_lost: bool,
    pub username: String,
    pub in_control: bool,
    pub queue_status: String,
    pub current_sample: Option<String>,
    pub loading: Option<String>,
    pub observers: usize,
    pub chat_messages: u64,
    pub log_records: usize,
    pub last_user_message: Option<String>,
}

impl ViewSummary {
    pub fn from_state(state: &AppState, network_connected: bool) -> Self {
        let loading = state
            .general
            .loading
            .as_ref()
            .filter(|notice| notice.loading)
            .map(|notice| {
                let mut line = format!("{}: {}", notice.title, notice.message);
                if notice.blocking {
                    line.push_str(" [blocking]");
                }
                if notice.abortable() {
                    line.push_str(" [abortable]");
                }
                line
            });

        let observers = state
            .remote_access
            .data
            .get("observers")
            .and_then(|observers| observers.as_array())
            .map_or(0, Vec::len);

        Self {
            network_connected,
            connection_lost: state.general.show_connection_lost_dialog,
            username: state.local_username().to_string(),
            in_control: state.in_control(),
            queue_status: state.shared.queue.status.clone(),
            current_sample: state.shared.queue.current_sample.clone(),
            loading,
            observers,
            chat_messages: state.remote_access.chat_message_count,
            log_records: state.logger.records.len(),
            last_user_message: state
                .general
                .user_messages
                .last()
                .map(|record| format!("{} {}", record.severity, record.message)),
        }
    }

    /// Human-readable lines for every field that differs from `previous`.
    pub fn changes(&self, previous: &ViewSummary) -> Vec<String> {
        let mut lines = Vec::new();

        if self.network_connected != previous.network_connected {
            lines.push(if self.network_connected {
                "Network channel connected".to_string()
            } else {
                "Network channel disconnected".to_string()
            });
        }
        if self.connection_lost != previous.connection_lost {
            lines.push(if self.connection_lost {
                "Connection to the server lost".to_string()
            } else {
                "Connection to the server restored".to_string()
            });
        }
        if self.username != previous.username {
            lines.push(match self.username.as_str() {
                "" => "Signed out".to_string(),
                name => format!("Signed in as {name}"),
            });
        }
        if self.in_control != previous.in_control {
            lines.push(if self.in_control {
                "You have control".to_string()
            } else {
                "You are observing".to_string()
            });
        }
        if self.queue_status != previous.queue_status {
            lines.push(format!("Queue: {}", self.queue_status));
        }
        if self.current_sample != previous.current_sample {
            lines.push(match &self.current_sample {
                Some(sample) => format!("Current sample: {sample}"),
                None => "No sample mounted".to_string(),
            });
        }
        if self.loading != previous.loading {
            lines.push(match &self.loading {
                Some(notice) => format!("Notice: {notice}"),
                None => "Notice dismissed".to_string(),
            });
        }
        if self.observers != previous.observers {
            lines.push(format!("Observers: {}", self.observers));
        }
        if self.chat_messages > previous.chat_messages {
            lines.push(format!(
                "{} new chat message(s)",
                self.chat_messages - previous.chat_messages
            ));
        }
        match &self.last_user_message {
            Some(message) if self.last_user_message != previous.last_user_message => {
                lines.push(format!("Server: {message}"));
            }
            _ => {}
        }

        lines
    }
}
