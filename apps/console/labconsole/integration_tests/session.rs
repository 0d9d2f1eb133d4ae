use labconsole::session::Session;

use client_core::config::ClientConfig;
use client_core::state::Mutation;

use models::LoginInfo;

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

/// Nothing listens here; channels keep retrying in the background.
const UNREACHABLE_ORIGIN: &str = "http://127.0.0.1:9";

fn config_with_identity_file(path: &Path) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.server.origin = UNREACHABLE_ORIGIN.to_string();
    config.storage.local_state_file = Some(path.to_path_buf());
    config
}

async fn file_eventually_contains(path: &Path, needle: &str) -> bool {
    for _ in 0..200 {
        if std::fs::read_to_string(path).is_ok_and(|contents| contents.contains(needle)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// **VALUE**: Verifies the identity partition is restored from disk before anything connects.
///
/// **WHY THIS MATTERS**: A restarted console must come back as the same user.
///
/// **BUG THIS CATCHES**: Would catch restore running after the persistor is attached,
/// which would overwrite the file with an empty identity.
#[tokio::test]
async fn given_identity_file_when_session_started_then_identity_restored() {
    // GIVEN: A previously written identity file
    let dir = TempDir::new().expect("temp dir");
    let file = dir.path().join("identity.json");
    std::fs::write(
        &file,
        json!({
            "persist:identity:root": {
                "info": {"loggedIn": true, "user": {"username": "alice", "inControl": true}}
            }
        })
        .to_string(),
    )
    .expect("write identity");

    // WHEN: Starting a session
    let session = Session::start(&config_with_identity_file(&file))
        .await
        .expect("session starts without a reachable server");

    // THEN: The identity is back and the server is reported unreachable
    let summary = session.summary().await;
    assert_eq!(summary.username, "alice");
    assert!(summary.in_control);
    assert!(!summary.network_connected);

    session.shutdown().await;
    assert!(file_eventually_contains(&file, "alice").await);
}

/// **VALUE**: Verifies identity changes are mirrored to the file while running.
///
/// **BUG THIS CATCHES**: Would catch the identity persistor never being attached.
#[tokio::test]
async fn given_running_session_when_identity_changes_then_file_updated() {
    let dir = TempDir::new().expect("temp dir");
    let file = dir.path().join("nested").join("identity.json");
    let session = Session::start(&config_with_identity_file(&file))
        .await
        .expect("session");

    let mut login = LoginInfo::default();
    login.logged_in = true;
    login.user.username = "bob".to_string();
    session
        .store()
        .dispatch(vec![Mutation::SetLoginInfo(login)])
        .await
        .expect("dispatch");

    assert!(file_eventually_contains(&file, "bob").await);

    session.shutdown().await;
}

/// **VALUE**: Verifies an invalid config is refused before any connection is attempted.
#[tokio::test]
async fn given_invalid_origin_when_session_started_then_error() {
    let mut config = ClientConfig::default();
    config.server.origin = "ftp://beamline".to_string();

    let result = Session::start(&config).await;

    assert!(result.is_err());
}
