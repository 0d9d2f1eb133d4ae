// Unit tests for the effect queue and runner

use crate::effects::{Effect, EffectHandler, EffectQueue, EffectRunner};
use crate::state::mutation::Mutation;
use crate::state::store::Store;
use crate::state::tree::AbortAction;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

/// Handler double: records effects in order and answers remote-access fetches.
#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<Effect>>,
}

#[async_trait]
impl EffectHandler for RecordingHandler {
    async fn handle(&self, effect: &Effect) -> Vec<Mutation> {
        self.seen.lock().expect("seen lock").push(effect.clone());
        match effect {
            Effect::FetchRemoteAccess => vec![Mutation::SetRemoteAccess(json!({"observers": []}))],
            _ => Vec::new(),
        }
    }
}

/// **VALUE**: Verifies effects run in queue order and feed their mutations back.
///
/// **WHY THIS MATTERS**: The login re-fetch must land after the remote-access re-fetch it
/// was queued behind.
///
/// **BUG THIS CATCHES**: Would catch effects being run concurrently or results discarded.
#[tokio::test]
async fn given_queued_effects_when_runner_drains_then_fifo_and_mutations_applied() {
    // GIVEN: A runner over a recording handler
    let store = Store::new();
    let handler = Arc::new(RecordingHandler::default());
    let (queue, effects) = EffectQueue::channel();

    queue.push(Effect::FetchRemoteAccess);
    queue.push(Effect::FetchLoginInfo);
    queue.push(Effect::ShowChatMessage("hi".to_string()));
    drop(queue);

    // WHEN: Running until the queue closes
    EffectRunner::new(handler.clone(), store.clone())
        .run(effects)
        .await;

    // THEN: Order kept, mutation applied
    assert_eq!(
        *handler.seen.lock().expect("seen lock"),
        vec![
            Effect::FetchRemoteAccess,
            Effect::FetchLoginInfo,
            Effect::ShowChatMessage("hi".to_string())
        ]
    );
    assert_eq!(
        store.snapshot().await.remote_access.data,
        json!({"observers": []})
    );
}

/// **VALUE**: Verifies a notice's cancel action maps to the stop-queue effect.
///
/// **BUG THIS CATCHES**: Would catch the cancel button doing nothing.
#[test]
fn given_stop_queue_abort_when_converted_then_stop_queue_effect() {
    assert_eq!(Effect::from(AbortAction::StopQueue), Effect::StopQueue);
}
