use crate::helpers::{FakeServer, eventually, wait_for_status};

use client_core::SyncClient;
use client_core::state::{Mutation, Store};
use client_core::storage::persistor::ROOT_KEY;
use client_core::storage::{KeyValueStore, Persistor, Shared, StorageKey};
use client_core::transport::ChannelStatus;

use models::LoginInfo;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

fn operator_login() -> LoginInfo {
    let mut login = LoginInfo::default();
    login.logged_in = true;
    login.user.username = "alice".to_string();
    login.user.in_control = true;
    login
}

/// **VALUE**: Verifies a controlling client writes its shared partition through to the server.
///
/// **WHY THIS MATTERS**: This is how the operator's queue layout reaches observers.
///
/// **BUG THIS CATCHES**: Would catch the persistor being wired to the wrong channel, or the
/// set event being encoded as two arguments instead of one pair.
#[tokio::test]
async fn given_operator_in_control_when_shared_state_changes_then_ui_state_set_emitted() {
    // GIVEN: A client in control with the shared persistor attached
    let server = FakeServer::start().await;
    let client = SyncClient::new(&server.config(Duration::from_secs(2))).expect("client");
    let store = Store::new();
    store
        .dispatch(vec![Mutation::SetLoginInfo(operator_login())])
        .await
        .expect("login");

    let remote = client.connect_state(&store);
    wait_for_status(remote.channel(), ChannelStatus::Connected).await;
    let persistor = Persistor::<Shared, _>::new(Arc::new(remote));
    store.attach_persistor(persistor).await.expect("attach");

    // WHEN: The shared partition changes
    store
        .dispatch(vec![Mutation::SetQueueStatus("QueueStarted".to_string())])
        .await
        .expect("dispatch");

    // THEN: One ui_state_set with [key, slice] arrives
    let packet = server.expect_event("/ui_state").await;
    let (name, args) = packet.event_parts().expect("named event");
    assert_eq!(name, "ui_state_set");
    assert_eq!(args[0][0], json!("persist:shared:root"));
    assert_eq!(args[0][1]["queue"]["status"], json!("QueueStarted"));

    client.disconnect().await;
}

/// **VALUE**: Verifies an observer's changes never reach the server.
///
/// **WHY THIS MATTERS**: Observers share the view, not the authority to change it.
///
/// **BUG THIS CATCHES**: Would catch the control gate being bypassed on the wire path.
#[tokio::test]
async fn given_observer_when_shared_state_changes_then_nothing_sent_but_reads_work() {
    // GIVEN: A client without control
    let server = FakeServer::start().await;
    let client = SyncClient::new(&server.config(Duration::from_secs(2))).expect("client");
    let store = Store::new();
    let remote = client.connect_state(&store);
    wait_for_status(remote.channel(), ChannelStatus::Connected).await;

    // WHEN: Writing, then reading
    remote
        .set_item(&StorageKey::new(ROOT_KEY), json!({"queue": {}}))
        .await
        .expect("dropped write is not an error");
    let read = tokio::spawn({
        let key = StorageKey::new(ROOT_KEY);
        async move { remote.get_item(&key).await }
    });

    // THEN: The first event on the wire is the read, never a set
    let packet = server.expect_event("/ui_state").await;
    let ack_id = packet.ack_id.expect("get is a request");
    let (name, _) = packet.event_parts().expect("named");
    assert_eq!(name, "ui_state_get");

    server.ack("/ui_state", ack_id, vec![Value::Null]);
    let value = read.await.expect("join").expect("get");
    assert_eq!(value, None);

    client.disconnect().await;
}

/// **VALUE**: Verifies a server `state_update` push overwrites the shared partition.
///
/// **WHY THIS MATTERS**: Observers follow the operator only through these pushes.
///
/// **BUG THIS CATCHES**: Would catch the handler not being registered before the channel opens.
#[tokio::test]
async fn given_connected_state_channel_when_state_update_pushed_then_store_rehydrated() {
    let server = FakeServer::start().await;
    let client = SyncClient::new(&server.config(Duration::from_secs(2))).expect("client");
    let store = Store::new();
    store
        .dispatch(vec![Mutation::SetQueueStatus("Local".to_string())])
        .await
        .expect("dispatch");
    let remote = client.connect_state(&store);
    wait_for_status(remote.channel(), ChannelStatus::Connected).await;

    let pushed = json!({"queue": {"status": "QueueRunning"}, "queueGUI": {"showResumeQueueDialog": true}});
    server.push("/ui_state", "state_update", vec![Value::String(pushed.to_string())]);

    eventually(async || store.read(|state| state.shared.queue.status == "QueueRunning").await).await;
    assert!(store.snapshot().await.shared.queue_gui.show_resume_queue_dialog);

    client.disconnect().await;
}
