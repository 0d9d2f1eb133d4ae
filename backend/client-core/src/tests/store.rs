// Unit tests for the state store actor, rehydration and persistor hooks

use crate::state::mutation::Mutation;
use crate::state::store::Store;
use crate::state::tree::{AppState, SharedState};
use crate::storage::{Shared, StatePersistor};

use models::{LoginInfo, SessionUser};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

/// Persistor double that tracks the shared partition and counts writes.
#[derive(Default)]
struct CountingPersistor {
    last: Mutex<Option<SharedState>>,
    persisted: AtomicUsize,
}

impl StatePersistor for CountingPersistor {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn track(&self, state: &AppState) -> bool {
        let mut last = self.last.lock().expect("last lock");
        if last.as_ref() == Some(&state.shared) {
            return false;
        }
        *last = Some(state.shared.clone());
        true
    }

    fn persist(&self, _state: &AppState) {
        self.persisted.fetch_add(1, Ordering::SeqCst);
    }
}

fn controlling_login() -> LoginInfo {
    LoginInfo {
        logged_in: true,
        user: SessionUser {
            username: "alice".to_string(),
            in_control: true,
            ..SessionUser::default()
        },
        ..LoginInfo::default()
    }
}

/// **VALUE**: Verifies a dispatched batch is visible to readers once dispatch returns.
///
/// **WHY THIS MATTERS**: The router reads state for the next event right after dispatching
/// the previous one; it must see the result.
///
/// **BUG THIS CATCHES**: Would catch dispatch returning before the actor applied the batch.
#[tokio::test]
async fn given_mutation_batch_when_dispatched_then_visible_and_revision_bumped() {
    // GIVEN: A fresh store
    let store = Store::new();
    let revision = store.subscribe_revision();
    let before = *revision.borrow();

    // WHEN: Dispatching two mutations as one batch
    store
        .dispatch(vec![
            Mutation::SetQueueStatus("QueueStarted".to_string()),
            Mutation::IncChatMessageCount,
        ])
        .await
        .expect("dispatch should succeed");

    // THEN: Both are applied and the revision moved once
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.shared.queue.status, "QueueStarted");
    assert_eq!(snapshot.remote_access.chat_message_count, 1);
    assert_eq!(*revision.borrow(), before + 1);
}

/// **VALUE**: Verifies an empty batch is not sent to the actor.
///
/// **BUG THIS CATCHES**: Would catch spurious revisions for events that changed nothing.
#[tokio::test]
async fn given_empty_batch_when_dispatched_then_revision_unchanged() {
    let store = Store::new();
    let revision = store.subscribe_revision();

    store.dispatch(Vec::new()).await.expect("empty dispatch is fine");

    assert_eq!(*revision.borrow(), 0);
}

/// **VALUE**: Verifies rehydration overwrites the shared partition without merging.
///
/// **WHY THIS MATTERS**: `state_update` is last-writer-wins. Keys missing from the payload
/// must disappear, otherwise observers keep stale queue entries forever.
///
/// **BUG THIS CATCHES**: Would catch a merge-style rehydrate.
#[tokio::test]
async fn given_existing_shared_state_when_rehydrated_then_replaced_wholesale() {
    // GIVEN: Shared state with a task and a status
    let store = Store::new();
    store
        .dispatch(vec![
            Mutation::AddTasks(vec![json!({"queueID": 1, "label": "Data collection"})]),
            Mutation::SetQueueStatus("QueueStarted".to_string()),
        ])
        .await
        .expect("dispatch");

    // WHEN: Rehydrating with a slice that only carries a workflow flag
    let mut pushed = SharedState::default();
    pushed.workflow.show_dialog = true;
    store
        .rehydrate::<Shared>(pushed.clone())
        .await
        .expect("rehydrate");

    // THEN: The shared partition equals the pushed slice exactly
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.shared, pushed);
    assert!(snapshot.shared.queue.tasks.is_empty());
}

/// **VALUE**: Verifies persistors run only when their partition changed, never on rehydrate.
///
/// **WHY THIS MATTERS**: Writing back a server push would echo it to the server and
/// every other client; writing on unrelated changes floods the ui-state channel.
///
/// **BUG THIS CATCHES**: Would catch persisting after every batch or after rehydration.
#[tokio::test]
async fn given_attached_persistor_when_state_changes_then_persists_only_partition_changes() {
    // GIVEN: A store with a counting persistor
    let store = Store::new();
    let persistor = Arc::new(CountingPersistor::default());
    store
        .attach_persistor(persistor.clone())
        .await
        .expect("attach");

    // WHEN: A transient slice changes
    store
        .dispatch(vec![Mutation::SaveMotorPosition {
            name: "phi".to_string(),
            position: Some(90.0),
        }])
        .await
        .expect("dispatch");

    // THEN: Nothing persisted
    assert_eq!(persistor.persisted.load(Ordering::SeqCst), 0);

    // WHEN: The shared partition changes
    store
        .dispatch(vec![Mutation::ShowResumeQueueDialog(true)])
        .await
        .expect("dispatch");

    // THEN: Persisted once
    assert_eq!(persistor.persisted.load(Ordering::SeqCst), 1);

    // WHEN: The same value is set again, then a rehydrate replaces the partition
    store
        .dispatch(vec![Mutation::ShowResumeQueueDialog(true)])
        .await
        .expect("dispatch");
    store
        .rehydrate::<Shared>(SharedState::default())
        .await
        .expect("rehydrate");

    // THEN: Still one write
    assert_eq!(persistor.persisted.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies the control token follows the login slice.
///
/// **WHY THIS MATTERS**: Remote writes are admitted on this token alone.
///
/// **BUG THIS CATCHES**: Would catch the token being computed once at construction.
#[tokio::test]
async fn given_login_changes_when_dispatched_then_control_token_follows() {
    // GIVEN: A store whose user is not in control
    let store = Store::new();
    let token = store.control_token();
    assert!(!token.in_control());

    // WHEN: Login info grants control
    store
        .dispatch(vec![Mutation::SetLoginInfo(controlling_login())])
        .await
        .expect("dispatch");

    // THEN: The token reads true
    assert!(token.in_control());

    // WHEN: Signing out
    store
        .dispatch(vec![Mutation::SignedOut])
        .await
        .expect("dispatch");

    // THEN: Back to false
    assert!(!token.in_control());
}

/// **VALUE**: Verifies a store built from an existing tree starts from it.
///
/// **BUG THIS CATCHES**: Would catch `with_state` ignoring the control flag of the given tree.
#[tokio::test]
async fn given_initial_state_in_control_when_store_created_then_token_true() {
    let mut initial = AppState::default();
    initial.login.info = controlling_login();

    let store = Store::with_state(initial);

    assert!(store.control_token().in_control());
    assert_eq!(store.read(|state| state.local_username().to_string()).await, "alice");
}
