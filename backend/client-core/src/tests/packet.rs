// Unit tests for the Engine.IO / Socket.IO text codec

use crate::transport::packet::{EnginePacket, PacketType, SocketPacket};

use serde_json::json;

/// **VALUE**: Verifies the server's open handshake is decoded with its ping timings.
///
/// **WHY THIS MATTERS**: The connection loop derives its liveness deadline from
/// `pingInterval + pingTimeout`. Misreading them drops healthy connections.
///
/// **BUG THIS CATCHES**: Would catch a camelCase rename regression on the handshake.
#[test]
fn given_open_frame_when_decoded_then_handshake_fields_are_read() {
    // GIVEN: A typical Engine.IO v4 open frame
    let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    // WHEN: Decoding
    let packet = EnginePacket::decode(frame).expect("open frame should decode");

    // THEN: Handshake values are exposed
    let EnginePacket::Open(handshake) = packet else {
        panic!("expected open packet, got {packet:?}");
    };
    assert_eq!(handshake.sid, "abc");
    assert_eq!(handshake.ping_interval, 25000);
    assert_eq!(handshake.ping_timeout, 20000);
}

/// **VALUE**: Verifies a ping's payload is echoed back in the pong.
///
/// **WHY THIS MATTERS**: Engine.IO servers close sockets that do not answer pings.
///
/// **BUG THIS CATCHES**: Would catch pong frames written with the wrong type digit.
#[test]
fn given_ping_with_probe_when_answered_then_pong_carries_same_data() {
    let EnginePacket::Ping(data) = EnginePacket::decode("2probe").expect("ping should decode")
    else {
        panic!("expected ping");
    };

    assert_eq!(EnginePacket::Pong(data).encode(), "3probe");
}

/// **VALUE**: Verifies an event on a namespace with an ack id decodes into all parts.
///
/// **WHY THIS MATTERS**: `task` and `queue` pushes arrive with ack ids; losing the id
/// means the server never gets its acknowledgement.
///
/// **BUG THIS CATCHES**: Would catch ack-id digits being parsed as part of the JSON body.
#[test]
fn given_namespaced_event_with_ack_id_when_decoded_then_parts_are_split() {
    // GIVEN: `2/hwr,17["task",{...}]`
    let text = r#"2/hwr,17["task",{"queueID":3,"state":1}]"#;

    // WHEN: Decoding
    let packet = SocketPacket::decode(text).expect("event should decode");

    // THEN: Namespace, ack id and event parts are separated
    assert_eq!(packet.kind, PacketType::Event);
    assert_eq!(packet.namespace, "/hwr");
    assert_eq!(packet.ack_id, Some(17));

    let (name, args) = packet.event_parts().expect("event has a name");
    assert_eq!(name, "task");
    assert_eq!(args, vec![json!({"queueID": 3, "state": 1})]);
}

/// **VALUE**: Verifies the root namespace is encoded without a prefix.
///
/// **WHY THIS MATTERS**: Writing `/,` for the root namespace is rejected by Socket.IO servers.
///
/// **BUG THIS CATCHES**: Would catch unconditional namespace prefixing.
#[test]
fn given_root_and_named_namespaces_when_encoded_then_only_named_is_prefixed() {
    assert_eq!(SocketPacket::connect("/").encode(), "0");
    assert_eq!(SocketPacket::connect("/ui_state").encode(), "0/ui_state,");
    assert_eq!(
        SocketPacket::event("/ui_state", "ui_state_get", vec![json!("persist:shared:root")], Some(4))
            .into_frame(),
        r#"42/ui_state,4["ui_state_get","persist:shared:root"]"#
    );
}

/// **VALUE**: Verifies the namespace CONNECT reply without payload decodes.
///
/// **WHY THIS MATTERS**: Older servers answer `40/hwr,` with no handshake body; the channel
/// must still flip to connected.
///
/// **BUG THIS CATCHES**: Would catch a decoder that requires JSON after the namespace.
#[test]
fn given_connect_reply_without_body_when_decoded_then_data_is_none() {
    let packet = SocketPacket::decode("0/hwr,").expect("connect should decode");

    assert_eq!(packet.kind, PacketType::Connect);
    assert_eq!(packet.namespace, "/hwr");
    assert_eq!(packet.data, None);
}

/// **VALUE**: Verifies binary events are recognised so they can be dropped.
///
/// **WHY THIS MATTERS**: Attachments arrive as separate frames this client does not read.
///
/// **BUG THIS CATCHES**: Would catch the attachment count being taken as a namespace.
#[test]
fn given_binary_event_when_decoded_then_flagged_binary() {
    let packet = SocketPacket::decode(r#"51-/hwr,["frame",{"_placeholder":true,"num":0}]"#)
        .expect("binary event header should decode");

    assert!(packet.kind.is_binary());
    assert_eq!(packet.namespace, "/hwr");
}

/// **VALUE**: Verifies garbage input is a codec error rather than a panic.
///
/// **WHY THIS MATTERS**: A single malformed frame must not take the connection task down.
///
/// **BUG THIS CATCHES**: Would catch slicing on an empty or unknown packet.
#[test]
fn given_malformed_frames_when_decoded_then_errors_are_returned() {
    assert!(EnginePacket::decode("").is_err());
    assert!(EnginePacket::decode("9").is_err());
    assert!(SocketPacket::decode("x/hwr,").is_err());
    assert!(SocketPacket::decode("2/hwr,[not json").is_err());
}
