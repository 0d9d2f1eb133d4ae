// Unit tests for AppState::apply

use crate::state::mutation::Mutation;
use crate::state::tree::{AppState, MAX_USER_MESSAGES};

use models::NodeId;
use models::payloads::{LogRecord, TaskLimsData, TaskRecord};

use serde_json::json;

fn record(message: &str) -> LogRecord {
    LogRecord {
        message: message.to_string(),
        severity: "INFO".to_string(),
        ..LogRecord::default()
    }
}

/// **VALUE**: Verifies user messages are capped, keeping the newest.
///
/// **WHY THIS MATTERS**: A chatty server would otherwise grow the tree without bound.
///
/// **BUG THIS CATCHES**: Would catch evicting the newest entries instead of the oldest.
#[test]
fn given_more_messages_than_cap_when_applied_then_oldest_dropped() {
    let mut state = AppState::default();

    for index in 0..(MAX_USER_MESSAGES + 5) {
        state.apply(&Mutation::AddUserMessage(record(&format!("m{index}"))));
    }

    assert_eq!(state.general.user_messages.len(), MAX_USER_MESSAGES);
    assert_eq!(state.general.user_messages[0].message, "m5");
    assert_eq!(
        state.general.user_messages.last().map(|r| r.message.as_str()),
        Some(format!("m{}", MAX_USER_MESSAGES + 4).as_str())
    );
}

/// **VALUE**: Verifies added tasks get a display entry the task rule can find.
///
/// **WHY THIS MATTERS**: Task progress is only recorded for nodes present in the display map.
///
/// **BUG THIS CATCHES**: Would catch numeric queue ids producing a different key than
/// the one task events use.
#[test]
fn given_added_tasks_when_applied_then_display_entries_exist_expanded() {
    let mut state = AppState::default();

    state.apply(&Mutation::AddTasks(vec![
        json!({"queueID": 12, "type": "DataCollection"}),
        json!({"label": "no id, skipped"}),
    ]));

    assert_eq!(state.shared.queue.tasks.len(), 1);
    let display = state.shared.queue_gui.display_data[&NodeId::new("12")];
    assert!(!display.collapsed);
}

/// **VALUE**: Verifies CollapseItem toggles each time it is applied.
///
/// **WHY THIS MATTERS**: The router decides whether to toggle; the reducer must not second-guess.
///
/// **BUG THIS CATCHES**: Would catch CollapseItem being implemented as "set collapsed".
#[test]
fn given_collapse_item_twice_when_applied_then_flag_restored() {
    let mut state = AppState::default();
    let node = NodeId::new("3");

    state.apply(&Mutation::CollapseItem(node.clone()));
    assert!(state.shared.queue_gui.display_data[&node].collapsed);

    state.apply(&Mutation::CollapseItem(node.clone()));
    assert!(!state.shared.queue_gui.display_data[&node].collapsed);
}

/// **VALUE**: Verifies LIMS data lands on the matching task result only.
///
/// **BUG THIS CATCHES**: Would catch matching on sample alone.
#[test]
fn given_lims_update_when_applied_then_only_matching_result_changes() {
    let mut state = AppState::default();
    for (id, index) in [("1", 0), ("2", 1)] {
        state.apply(&Mutation::AddTaskResult(TaskRecord {
            sample: "1:01".to_string(),
            task_index: Some(index),
            state: TaskRecord::STATE_FINISHED,
            progress: 1.0,
            lims_result_data: json!(null),
            queue_id: NodeId::new(id),
        }));
    }

    state.apply(&Mutation::UpdateTaskLimsData(TaskLimsData {
        sample: "1:01".to_string(),
        task_index: 1,
        lims_result_data: json!({"dataCollectionId": 77}),
    }));

    let results = &state.shared.queue.task_results;
    assert_eq!(results[&NodeId::new("1")].lims_result_data, json!(null));
    assert_eq!(
        results[&NodeId::new("2")].lims_result_data,
        json!({"dataCollectionId": 77})
    );
}

/// **VALUE**: Verifies sign-out clears identity but leaves shared state alone.
///
/// **BUG THIS CATCHES**: Would catch sign-out resetting the whole tree.
#[test]
fn given_signed_in_state_when_signed_out_then_only_login_reset() {
    let mut state = AppState::default();
    state.login.info.user.username = "alice".to_string();
    state.login.info.user.in_control = true;
    state.apply(&Mutation::SetQueueStatus("QueueStopped".to_string()));

    state.apply(&Mutation::SignedOut);

    assert!(!state.in_control());
    assert_eq!(state.local_username(), "");
    assert_eq!(state.shared.queue.status, "QueueStopped");
}

/// **VALUE**: Verifies hiding the overlay clears its text.
///
/// **BUG THIS CATCHES**: Would catch a stale overlay message surviving `show: false`.
#[test]
fn given_overlay_shown_then_hidden_when_applied_then_cleared() {
    let mut state = AppState::default();

    state.apply(&Mutation::VideoMessageOverlay {
        show: true,
        message: "centring".to_string(),
    });
    assert_eq!(state.sample_view.video_message_overlay.as_deref(), Some("centring"));

    state.apply(&Mutation::VideoMessageOverlay {
        show: false,
        message: String::new(),
    });
    assert_eq!(state.sample_view.video_message_overlay, None);
}
