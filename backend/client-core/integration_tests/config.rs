use client_core::config::ClientConfig;
use client_core::error::config::ConfigError;

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: Verifies a missing config file yields defaults rather than an error.
///
/// **WHY THIS MATTERS**: First launch has no config directory at all.
///
/// **BUG THIS CATCHES**: Would catch first launch failing on a missing file.
#[test]
fn given_no_config_file_when_loaded_then_defaults_returned() {
    let dir = TempDir::new().expect("temp dir");

    let config = ClientConfig::load(dir.path()).expect("load");

    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.grace_interval(), Duration::from_millis(2000));
    assert_eq!(config.remote_ack_timeout(), None);
}

/// **VALUE**: Verifies a saved config loads back identically and leaves no temp file.
///
/// **BUG THIS CATCHES**: Would catch the atomic rename leaving `config.json.tmp` behind.
#[test]
fn given_custom_config_when_saved_and_loaded_then_round_trips() {
    // GIVEN: A non-default config
    let dir = TempDir::new().expect("temp dir");
    let mut config = ClientConfig::default();
    config.server.origin = "https://beamline.example.org:8443".to_string();
    config.connection.grace_interval_ms = 750;
    config.storage.remote_ack_timeout_ms = Some(3000);

    // WHEN: Saving then loading
    config.save(dir.path()).expect("save");
    let loaded = ClientConfig::load(dir.path()).expect("load");

    // THEN: Same values, one file
    assert_eq!(loaded, config);
    assert_eq!(loaded.remote_ack_timeout(), Some(Duration::from_secs(3)));
    assert!(dir.path().join("config.json").exists());
    assert!(!dir.path().join("config.json.tmp").exists());

    let origin = loaded.origin().expect("origin");
    assert_eq!(origin.http_base(), "https://beamline.example.org:8443/");
}

/// **VALUE**: Verifies missing fields fall back to defaults per field.
///
/// **BUG THIS CATCHES**: Would catch a partial file rejecting the whole config.
#[test]
fn given_partial_config_file_when_loaded_then_missing_fields_defaulted() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"server": {"origin": "http://10.0.0.5:8081"}}"#,
    )
    .expect("write");

    let config = ClientConfig::load(dir.path()).expect("load");

    assert_eq!(config.server.origin, "http://10.0.0.5:8081");
    assert_eq!(config.connection, ClientConfig::default().connection);
}

/// **VALUE**: Verifies malformed JSON is reported as a parse error with the file path.
#[test]
fn given_malformed_config_file_when_loaded_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("config.json"), "{ not json").expect("write");

    let result = ClientConfig::load(dir.path());

    match result {
        Err(ConfigError::ParseError { path, .. }) => assert!(path.ends_with("config.json")),
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

/// **VALUE**: Verifies every invalid value is rejected before the client starts.
///
/// **WHY THIS MATTERS**: A zero grace interval would raise the lost-connection dialog on every
/// blip; a zero ack timeout would fail every remote read.
///
/// **BUG THIS CATCHES**: Would catch a validation rule being dropped.
#[test]
fn given_invalid_values_when_validated_then_rejected() {
    let cases: Vec<(&str, Box<dyn Fn(&mut ClientConfig)>)> = vec![
        ("version zero", Box::new(|c| c.version = 0)),
        ("future version", Box::new(|c| c.version = 99)),
        ("unparsable origin", Box::new(|c| c.server.origin = "::::".to_string())),
        ("zero grace", Box::new(|c| c.connection.grace_interval_ms = 0)),
        (
            "initial above max",
            Box::new(|c| {
                c.connection.reconnect_initial_ms = 10_000;
                c.connection.reconnect_max_ms = 100;
            }),
        ),
        ("zero ack timeout", Box::new(|c| c.storage.remote_ack_timeout_ms = Some(0))),
    ];

    for (label, mutate) in cases {
        let mut config = ClientConfig::default();
        mutate(&mut config);
        assert!(config.validate().is_err(), "{label} should be rejected");
    }
}

/// **VALUE**: Verifies an unsupported origin scheme is rejected.
///
/// **BUG THIS CATCHES**: Would catch `ftp://` origins producing a nonsense websocket URL.
#[test]
fn given_unsupported_scheme_when_validated_then_rejected() {
    let mut config = ClientConfig::default();
    config.server.origin = "ftp://beamline:21".to_string();

    assert!(config.validate().is_err());
}

/// **VALUE**: Verifies invalid configs are never written to disk.
#[test]
fn given_invalid_config_when_saved_then_nothing_written() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = ClientConfig::default();
    config.connection.grace_interval_ms = 0;

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("config.json").exists());
}
