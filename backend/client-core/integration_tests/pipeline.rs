//! End-to-end routing: loopback socket server in, store out.

use crate::helpers::{FakeServer, eventually, wait_for_status};

use client_core::SyncClient;
use client_core::effects::{ApiClient, EffectQueue, EffectRunner, LogChatSink, ServerEffects};
use client_core::router::{NoSnapshot, SnapshotSource};
use client_core::state::Store;
use client_core::transport::{Channel, ChannelStatus};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// REST base for tests that never reach the HTTP side.
const UNUSED_API: &str = "http://127.0.0.1:9/";

struct FixedSnapshot;

impl SnapshotSource for FixedSnapshot {
    fn take_snapshot(&self) -> Value {
        json!("data:image/jpeg;base64,AAAA")
    }
}

struct Pipeline {
    server: FakeServer,
    client: SyncClient,
    store: Store,
}

impl Pipeline {
    async fn start(grace: Duration, api_base: &str, snapshots: Arc<dyn SnapshotSource>) -> Self {
        let server = FakeServer::start().await;
        let client = SyncClient::new(&server.config(grace)).expect("client");
        let store = Store::new();

        let (effects, queue) = EffectQueue::channel();
        let api = ApiClient::new(api_base).expect("api client");
        let handler = Arc::new(ServerEffects::new(api, Arc::new(LogChatSink)));
        EffectRunner::new(handler, store.clone()).spawn(queue);

        client.listen(&store, effects, snapshots);
        wait_for_status(
            &client.multiplexer().channel(Channel::Hardware),
            ChannelStatus::Connected,
        )
        .await;

        Self {
            server,
            client,
            store,
        }
    }
}

/// **VALUE**: Verifies a hardware push ends up in the store.
///
/// **WHY THIS MATTERS**: This is the main path of the whole client.
///
/// **BUG THIS CATCHES**: Would catch the router sink not being attached before the channel opens.
#[tokio::test]
async fn given_listening_client_when_motor_position_pushed_then_store_updated() {
    // GIVEN: A listening client
    let pipeline =
        Pipeline::start(Duration::from_secs(2), UNUSED_API, Arc::new(NoSnapshot)).await;

    // WHEN: The server reports a motor position
    pipeline.server.push(
        "/hwr",
        "motor_position",
        vec![json!({"name": "phi", "position": 12.5})],
    );

    // THEN: The motor entry carries the new position
    eventually(async || {
        pipeline
            .store
            .read(|state| {
                state
                    .sample_view
                    .motors
                    .get("phi")
                    .and_then(|motor| motor.position)
                    == Some(12.5)
            })
            .await
    })
    .await;

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies log records pushed on the logging channel reach both log slices.
///
/// **BUG THIS CATCHES**: Would catch the logging channel being opened without a sink.
#[tokio::test]
async fn given_listening_client_when_log_record_pushed_then_logger_and_messages_updated() {
    let pipeline =
        Pipeline::start(Duration::from_secs(2), UNUSED_API, Arc::new(NoSnapshot)).await;
    wait_for_status(
        &pipeline.client.multiplexer().channel(Channel::Logging),
        ChannelStatus::Connected,
    )
    .await;

    pipeline.server.push(
        "/logging",
        "log_record",
        vec![json!({"message": "beam lost", "severity": "WARNING"})],
    );

    eventually(async || pipeline.store.read(|state| state.logger.records.len() == 1).await).await;
    let state = pipeline.store.snapshot().await;
    assert_eq!(state.general.user_messages[0].message, "beam lost");
    assert_eq!(state.logger.records[0].severity, "WARNING");

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies an observers change triggers a remote-access refresh over HTTP.
///
/// **WHY THIS MATTERS**: The observer list is never pushed; only the change notice is.
///
/// **BUG THIS CATCHES**: Would catch effects being produced by the router but never run.
#[tokio::test]
async fn given_observers_changed_when_routed_then_remote_access_fetched_into_store() {
    // GIVEN: A REST server with remote-access data and a listening client
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/ra/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"observers": [{"username": "bob", "nickname": "Bob"}]}
        })))
        .expect(1..)
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/login/login_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"loggedIn": false})))
        .mount(&api)
        .await;
    let pipeline =
        Pipeline::start(Duration::from_secs(2), &api.uri(), Arc::new(NoSnapshot)).await;

    // WHEN: The server announces a new observer
    pipeline.server.push(
        "/hwr",
        "observersChanged",
        vec![json!({"observers": [{"username": "bob"}], "operator": {}})],
    );

    // THEN: The fetched data lands in the remote-access slice
    eventually(async || {
        pipeline
            .store
            .read(|state| state.remote_access.data["observers"][0]["username"] == json!("bob"))
            .await
    })
    .await;

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies task events are acknowledged and recorded.
///
/// **WHY THIS MATTERS**: The server waits on the ack before advancing the queue.
///
/// **BUG THIS CATCHES**: Would catch the ack being dropped when the task is unknown locally.
#[tokio::test]
async fn given_task_event_with_ack_when_routed_then_acked_and_result_recorded() {
    let pipeline =
        Pipeline::start(Duration::from_secs(2), UNUSED_API, Arc::new(NoSnapshot)).await;
    pipeline.server.push_with_ack(
        "/hwr",
        "add_task",
        vec![json!({"tasks": [{"queueID": 7, "type": "DataCollection"}]})],
        Some(1),
    );
    pipeline.server.expect_frame(|frame| frame.starts_with("43/hwr,1")).await;

    pipeline.server.push_with_ack(
        "/hwr",
        "task",
        vec![json!({"queueID": 7, "taskIndex": 0, "state": 2, "progress": 1.0, "sample": "1:01"})],
        Some(2),
    );

    pipeline.server.expect_frame(|frame| frame.starts_with("43/hwr,2")).await;
    eventually(async || {
        pipeline
            .store
            .read(|state| state.shared.queue.task_results.len() == 1)
            .await
    })
    .await;

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies snapshot requests are answered from the snapshot source.
#[tokio::test]
async fn given_snapshot_request_when_routed_then_ack_carries_snapshot() {
    let pipeline =
        Pipeline::start(Duration::from_secs(2), UNUSED_API, Arc::new(FixedSnapshot)).await;

    pipeline.server.push_with_ack("/hwr", "take_xtal_snapshot", Vec::new(), Some(4));

    let ack = pipeline.server.expect_frame(|frame| frame.starts_with("43/hwr,4")).await;
    assert_eq!(ack, r#"43/hwr,4["data:image/jpeg;base64,AAAA"]"#);

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies a brief drop shorter than the grace interval never raises the dialog.
///
/// **WHY THIS MATTERS**: Flickering reconnects must not interrupt the operator.
///
/// **BUG THIS CATCHES**: Would catch the dialog being raised on the first disconnect.
#[tokio::test]
async fn given_short_drop_when_reconnected_within_grace_then_no_dialog() {
    // GIVEN: A connected client with a generous grace interval
    let pipeline =
        Pipeline::start(Duration::from_secs(2), UNUSED_API, Arc::new(NoSnapshot)).await;
    let hwr = pipeline.client.multiplexer().channel(Channel::Hardware);

    // WHEN: The connection drops and is re-established
    pipeline.server.drop_connection();
    pipeline.server.expect_frame(|frame| frame == "40/hwr,").await;
    pipeline.server.expect_frame(|frame| frame == "40/hwr,").await;
    wait_for_status(&hwr, ChannelStatus::Connected).await;

    // THEN: The dialog was never raised
    assert!(!pipeline.store.read(|state| state.general.show_connection_lost_dialog).await);

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies an outage outlasting the grace interval raises the dialog.
///
/// **BUG THIS CATCHES**: Would catch the grace timer never firing or firing with a stale epoch.
#[tokio::test]
async fn given_server_gone_when_grace_elapses_then_connection_lost_dialog_shown() {
    // GIVEN: A connected client with a short grace interval
    let pipeline =
        Pipeline::start(Duration::from_millis(100), UNUSED_API, Arc::new(NoSnapshot)).await;

    // WHEN: The server goes away for good
    pipeline.server.shutdown();

    // THEN: The dialog is raised once the grace interval passes
    eventually(async || {
        pipeline
            .store
            .read(|state| state.general.show_connection_lost_dialog)
            .await
    })
    .await;

    pipeline.client.disconnect().await;
}

/// **VALUE**: Verifies a deliberate disconnect never raises the connection-lost dialog.
///
/// **WHY THIS MATTERS**: Shutting the client down is not an outage; the dialog would pop up
/// one grace interval later while the application is closing.
///
/// **BUG THIS CATCHES**: Would catch the final `Disconnected` transition reaching the monitor.
#[tokio::test]
async fn given_connected_client_when_disconnected_on_purpose_then_no_dialog() {
    // GIVEN: A connected client with a short grace interval
    let pipeline =
        Pipeline::start(Duration::from_millis(50), UNUSED_API, Arc::new(NoSnapshot)).await;

    // WHEN: Disconnecting and waiting well past the grace interval
    pipeline.client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // THEN: The dialog was never raised
    assert!(!pipeline.store.read(|state| state.general.show_connection_lost_dialog).await);
}
