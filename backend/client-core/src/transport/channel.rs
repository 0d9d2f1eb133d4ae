use std::fmt::{Display, Formatter, Result as FormatResult};

/// One logical event stream of the instrument server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Network,
    /// Hardware object events; the channel whose liveness drives the lost-connection dialog.
    Hardware,
    Logging,
    UiState,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Network,
        Channel::Hardware,
        Channel::Logging,
        Channel::UiState,
    ];

    /// Socket.IO namespace, also the path suffix of the channel endpoint.
    pub fn namespace(&self) -> &'static str {
        match self {
            Channel::Network => "/network",
            Channel::Hardware => "/hwr",
            Channel::Logging => "/logging",
            Channel::UiState => "/ui_state",
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.namespace() == namespace)
    }
}

impl Display for Channel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.namespace())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connected,
    Disconnected,
}
