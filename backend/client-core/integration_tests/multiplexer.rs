use crate::helpers::{FakeServer, WAIT, wait_for_status};

use client_core::error::transport::TransportError;
use client_core::transport::{
    Channel, ChannelStatus, InboundFrame, Multiplexer, ReconnectPolicy, TransportEvent,
};

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_interval: Duration::from_millis(20),
        max_interval: Duration::from_millis(100),
        max_elapsed: None,
    }
}

async fn next_frame(inbound: &mut mpsc::UnboundedReceiver<InboundFrame>) -> InboundFrame {
    timeout(WAIT, inbound.recv())
        .await
        .expect("Timed out waiting for inbound frame")
        .expect("sink closed")
}

/// **VALUE**: Verifies opening a channel joins its namespace and reports connected.
///
/// **WHY THIS MATTERS**: Nothing is routed until the server accepts the namespace CONNECT.
///
/// **BUG THIS CATCHES**: Would catch CONNECT being sent before the engine is open, or the
/// status never flipping on the server's reply.
#[tokio::test]
async fn given_server_when_channel_opened_then_namespace_joined_and_connected() {
    // GIVEN: A loopback server
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());

    // WHEN: Opening the hardware channel
    let hwr = multiplexer.open(Channel::Hardware);

    // THEN: CONNECT for /hwr reaches the server and the channel reports connected
    server.expect_frame(|frame| frame == "40/hwr,").await;
    wait_for_status(&hwr, ChannelStatus::Connected).await;
    assert!(hwr.is_connected());
    assert!(!multiplexer.channel(Channel::Logging).is_connected());

    multiplexer.disconnect().await;
}

/// **VALUE**: Verifies a handler's acknowledgement is written back with the server's ack id.
///
/// **WHY THIS MATTERS**: The server blocks queue progress on these acks.
///
/// **BUG THIS CATCHES**: Would catch acks sent on the wrong namespace or with a new id.
#[tokio::test]
async fn given_event_with_ack_id_when_handler_acks_then_server_receives_ack() {
    // GIVEN: A connected channel with a handler that acknowledges
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let hwr = multiplexer.channel(Channel::Hardware);
    hwr.on("ping_me", |args, ack| {
        if let Some(ack) = ack {
            ack.send(vec![json!({"echo": args})]);
        }
    });
    multiplexer.open(Channel::Hardware);
    wait_for_status(&hwr, ChannelStatus::Connected).await;

    // WHEN: The server pushes an event with ack id 9
    server.push_with_ack("/hwr", "ping_me", vec![json!(1)], Some(9));

    // THEN: The ack comes back on /hwr with id 9
    let ack = server.expect_frame(|frame| frame.starts_with("43/hwr,")).await;
    assert_eq!(ack, r#"43/hwr,9[{"echo":[1]}]"#);

    multiplexer.disconnect().await;
}

/// **VALUE**: Verifies a request resolves with the server's ACK arguments.
///
/// **BUG THIS CATCHES**: Would catch pending requests keyed without their channel.
#[tokio::test]
async fn given_connected_channel_when_request_acked_then_future_resolves() {
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let ui_state = multiplexer.open(Channel::UiState);
    wait_for_status(&ui_state, ChannelStatus::Connected).await;

    let pending = ui_state.request("ui_state_get", vec![json!("persist:shared:root")]);
    let request = server.expect_event("/ui_state").await;
    let ack_id = request.ack_id.expect("request carries an ack id");
    server.ack("/ui_state", ack_id, vec![json!({"queue": {}})]);

    let response = timeout(WAIT, pending.response())
        .await
        .expect("ack in time")
        .expect("ack delivered");
    assert_eq!(response, vec![json!({"queue": {}})]);

    multiplexer.disconnect().await;
}

/// **VALUE**: Verifies a request on a channel that is not connected fails at once.
///
/// **WHY THIS MATTERS**: Sends before connect are dropped; a request must not wait for an
/// ack that can never come.
///
/// **BUG THIS CATCHES**: Would catch dropped requests leaving a future that hangs forever.
#[tokio::test]
async fn given_unopened_channel_when_request_sent_then_ack_dropped() {
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());

    let result = multiplexer
        .channel(Channel::UiState)
        .request("ui_state_getkeys", vec![json!(null)])
        .response()
        .await;

    assert!(matches!(result, Err(TransportError::AckDropped { .. })));
}

/// **VALUE**: Verifies unhandled events and status changes reach the sink in order.
///
/// **WHY THIS MATTERS**: The router relies on per-channel FIFO delivery.
///
/// **BUG THIS CATCHES**: Would catch events being reordered or status being skipped.
#[tokio::test]
async fn given_attached_sink_when_events_pushed_then_delivered_in_order() {
    // GIVEN: A sink on the logging channel
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let (sink, mut inbound) = mpsc::unbounded_channel();
    multiplexer.channel(Channel::Logging).attach(sink);
    let logging = multiplexer.open(Channel::Logging);

    // THEN: The first frame is the connected transition
    let first = next_frame(&mut inbound).await;
    assert_eq!(first.channel, Channel::Logging);
    assert!(matches!(first.event, TransportEvent::Status(ChannelStatus::Connected)));
    assert!(logging.is_connected());

    // WHEN: Three records are pushed
    for index in 0..3 {
        server.push("/logging", "log_record", vec![json!({"message": format!("r{index}")})]);
    }

    // THEN: They arrive in push order
    for index in 0..3 {
        let frame = next_frame(&mut inbound).await;
        let TransportEvent::Event { name, args, .. } = frame.event else {
            panic!("expected event");
        };
        assert_eq!(name, "log_record");
        assert_eq!(args, vec![json!({"message": format!("r{index}")})]);
    }

    multiplexer.disconnect().await;
}

/// **VALUE**: Verifies a dropped connection is re-established and namespaces rejoined.
///
/// **WHY THIS MATTERS**: Recovery is the transport's job; the monitor only sees transitions.
///
/// **BUG THIS CATCHES**: Would catch channels not being re-CONNECTed after reconnection.
#[tokio::test]
async fn given_connection_dropped_when_server_accepts_again_then_channel_reconnects() {
    // GIVEN: A connected hardware channel
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let hwr = multiplexer.open(Channel::Hardware);
    server.expect_frame(|frame| frame == "40/hwr,").await;
    wait_for_status(&hwr, ChannelStatus::Connected).await;
    let mut status = hwr.subscribe_status();

    // WHEN: The server drops the socket
    server.drop_connection();

    // THEN: Disconnected, then connected again after a fresh CONNECT
    timeout(WAIT, status.wait_for(|s| *s == ChannelStatus::Disconnected))
        .await
        .expect("disconnect noticed")
        .expect("status open");
    server.expect_frame(|frame| frame == "40/hwr,").await;
    wait_for_status(&hwr, ChannelStatus::Connected).await;

    multiplexer.disconnect().await;
}

/// **VALUE**: Verifies disconnect leaves every namespace and marks channels disconnected.
///
/// **BUG THIS CATCHES**: Would catch the connection task reconnecting after shutdown.
#[tokio::test]
async fn given_open_channels_when_disconnected_then_namespaces_left_and_not_running() {
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let hwr = multiplexer.open(Channel::Hardware);
    wait_for_status(&hwr, ChannelStatus::Connected).await;

    multiplexer.disconnect().await;

    server.expect_frame(|frame| frame == "41/hwr,").await;
    assert_eq!(hwr.status(), ChannelStatus::Disconnected);
    assert!(!multiplexer.is_running());
}

/// **VALUE**: Verifies a deliberate disconnect is not forwarded to the sink as a status change.
///
/// **WHY THIS MATTERS**: The hardware sink feeds the connection monitor. A forwarded
/// `Disconnected` on shutdown starts the grace timer and raises the connection-lost dialog
/// for a close the user asked for.
///
/// **BUG THIS CATCHES**: Would catch the final status being published to attached sinks, or
/// genuine drops no longer being forwarded.
#[tokio::test]
async fn given_attached_sink_when_disconnected_deliberately_then_no_status_forwarded() {
    // GIVEN: A hardware sink that saw the first connect
    let server = FakeServer::start().await;
    let multiplexer = Multiplexer::new(&server.origin, fast_policy());
    let (sink, mut inbound) = mpsc::unbounded_channel();
    multiplexer.channel(Channel::Hardware).attach(sink);
    let hwr = multiplexer.open(Channel::Hardware);
    let first = next_frame(&mut inbound).await;
    assert!(matches!(first.event, TransportEvent::Status(ChannelStatus::Connected)));

    // WHEN: The server drops the socket
    server.drop_connection();

    // THEN: The loss and the recovery are both forwarded
    let lost = next_frame(&mut inbound).await;
    assert!(matches!(lost.event, TransportEvent::Status(ChannelStatus::Disconnected)));
    let back = next_frame(&mut inbound).await;
    assert!(matches!(back.event, TransportEvent::Status(ChannelStatus::Connected)));

    // WHEN: Disconnecting on purpose
    multiplexer.disconnect().await;

    // THEN: The channel reads disconnected but the sink heard nothing
    assert_eq!(hwr.status(), ChannelStatus::Disconnected);
    assert!(inbound.try_recv().is_err());
}
