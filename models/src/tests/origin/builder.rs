use crate::{ModelError, Scheme, ServerOriginBuilder};

/// **VALUE**: Verifies that a complete builder produces the origin every channel is derived from.
///
/// **WHY THIS MATTERS**: All four realtime channels and every REST call are addressed relative
/// to this origin. A wrong scheme or port means nothing connects.
///
/// **BUG THIS CATCHES**: Would catch if the builder drops or swaps fields.
#[test]
fn given_complete_builder_when_building_then_returns_origin() {
    // GIVEN: Builder with scheme, host and port
    let builder = ServerOriginBuilder::default()
        .with_scheme("https")
        .with_host("beamline.example.org")
        .with_port(8081);

    // WHEN: Building
    let origin = builder.build().expect("origin should build");

    // THEN: All fields are carried through
    assert_eq!(origin.scheme, Scheme::Https);
    assert_eq!(origin.host, "beamline.example.org");
    assert_eq!(origin.port, 8081);
}

/// **VALUE**: Verifies the derived endpoints: realtime socket URL, channel endpoint and REST base.
///
/// **WHY THIS MATTERS**: Channels are addressed by fixed path suffixes on the page's own origin
/// and port, and the shared connection must use the matching WebSocket scheme.
///
/// **BUG THIS CATCHES**: Would catch a `ws` scheme on an `https` origin (mixed content) or a
/// missing Engine.IO query string.
#[test]
fn given_origin_when_deriving_endpoints_then_uses_same_host_and_port() {
    // GIVEN: A plain http origin
    let origin = ServerOriginBuilder::default()
        .with_host("localhost")
        .with_port(8081)
        .build()
        .expect("origin should build");

    // WHEN/THEN: Endpoints share host and port
    assert_eq!(origin.http_base(), "http://localhost:8081/");
    assert_eq!(origin.channel_endpoint("/hwr"), "http://localhost:8081/hwr");
    assert_eq!(
        origin.socket_url(),
        "ws://localhost:8081/socket.io/?EIO=4&transport=websocket"
    );
}

/// **VALUE**: Verifies that an empty host is rejected.
///
/// **WHY THIS MATTERS**: An empty host produces URLs like `ws://:8081`, which fail deep inside
/// the transport with an unhelpful error.
///
/// **BUG THIS CATCHES**: Would catch if the empty-host validation is removed.
#[test]
fn given_empty_host_when_building_then_returns_validation_error() {
    // GIVEN: Builder with an empty host
    let builder = ServerOriginBuilder::default().with_host("").with_port(8081);

    // WHEN: Building
    let result = builder.build();

    // THEN: Validation error names the host
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Host cannot be empty");
        }
        Ok(origin) => panic!("expected validation error, got {origin:?}"),
    }
}

/// **VALUE**: Verifies that unsupported schemes and zero ports are rejected.
///
/// **BUG THIS CATCHES**: Would catch if `ftp://` origins or port 0 slip through to the transport.
#[test]
fn given_bad_scheme_or_port_when_building_then_returns_validation_error() {
    // GIVEN/WHEN: An ftp scheme
    let bad_scheme = ServerOriginBuilder::default()
        .with_scheme("ftp")
        .with_host("localhost")
        .with_port(21)
        .build();

    // GIVEN/WHEN: Port zero
    let bad_port = ServerOriginBuilder::default()
        .with_host("localhost")
        .with_port(0)
        .build();

    // THEN: Both fail
    assert!(bad_scheme.is_err(), "ftp scheme should be rejected");
    assert!(bad_port.is_err(), "port 0 should be rejected");
}
