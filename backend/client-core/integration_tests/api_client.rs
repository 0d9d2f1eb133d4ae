use client_core::effects::{ApiClient, ChatSink, Effect, EffectHandler, ServerEffects};
use client_core::error::api::ApiError;
use client_core::state::Mutation;

use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingChat {
    lines: Mutex<Vec<String>>,
}

impl ChatSink for RecordingChat {
    fn show(&self, message: &str) {
        self.lines.lock().expect("chat lock").push(message.to_string());
    }
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).expect("mock uri is a valid base url")
}

/// **VALUE**: Verifies the remote-access query returns the `data` member only.
///
/// **WHY THIS MATTERS**: The remote-access slice stores the inner object, not the envelope.
///
/// **BUG THIS CATCHES**: Would catch storing `{"data": ...}` and breaking every observer lookup.
#[tokio::test]
async fn given_remote_access_response_when_fetched_then_data_member_returned() {
    // GIVEN: A server answering the remote-access endpoint
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/ra/"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"observers": [{"username": "bob"}], "requestingObserver": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // WHEN: Fetching remote access
    let data = client_for(&server).remote_access().await.expect("fetch");

    // THEN: Only the inner object is returned
    assert_eq!(data["observers"][0]["username"], json!("bob"));
    assert!(data.get("data").is_none());
}

/// **VALUE**: Verifies login info decodes the server's loose boolean encoding.
///
/// **BUG THIS CATCHES**: Would catch `inControl: ""` failing to decode for anonymous sessions.
#[tokio::test]
async fn given_login_info_with_string_flags_when_fetched_then_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/login/login_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "beamlineName": "ID30",
            "loggedIn": true,
            "user": {"username": "alice", "nickname": "Alice", "inControl": "", "isstaff": 1}
        })))
        .mount(&server)
        .await;

    let info = client_for(&server).login_info().await.expect("fetch");

    assert!(info.logged_in);
    assert_eq!(info.beamline_name, "ID30");
    assert_eq!(info.user.username, "alice");
    assert!(!info.user.in_control);
    assert!(info.user.is_staff);
}

/// **VALUE**: Verifies stop-queue is sent as a PUT.
///
/// **WHY THIS MATTERS**: The abort button of a blocking notice depends on this call.
///
/// **BUG THIS CATCHES**: Would catch the request going out as a GET and being rejected.
#[tokio::test]
async fn given_stop_queue_when_called_then_put_request_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/mxcube/api/v0.1/queue/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).stop_queue().await.expect("stop");
}

/// **VALUE**: Verifies non-success statuses surface as server errors with the status and body.
///
/// **WHY THIS MATTERS**: Effect failures are only logged; the log line must say what went wrong.
///
/// **BUG THIS CATCHES**: Would catch a 500 body being parsed as JSON and reported as a decode error.
#[tokio::test]
async fn given_server_error_when_fetching_contents_then_server_error_returned() {
    // GIVEN: A failing sample changer endpoint
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/sample_changer/contents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("changer offline"))
        .mount(&server)
        .await;

    // WHEN: Fetching contents
    let result = client_for(&server).sample_changer_contents().await;

    // THEN: A server error carrying status and body
    match result {
        Err(ApiError::Server { message, .. }) => {
            assert!(message.contains("500"));
            assert!(message.contains("changer offline"));
        }
        other => panic!("Expected ApiError::Server, got {other:?}"),
    }
}

/// **VALUE**: Verifies a base url that cannot be parsed is rejected at construction.
#[test]
fn given_invalid_base_url_when_constructing_then_url_parse_error() {
    let result = ApiClient::new("not a url");

    assert!(matches!(result, Err(ApiError::UrlParse { .. })));
}

/// **VALUE**: Verifies effects turn REST results into store mutations.
///
/// **WHY THIS MATTERS**: Effects never touch state directly; the store only learns
/// through returned mutations.
///
/// **BUG THIS CATCHES**: Would catch sign-out succeeding on the server but leaving the
/// local identity in place.
#[tokio::test]
async fn given_successful_calls_when_effects_handled_then_mutations_returned() {
    // GIVEN: A server answering sign-out and remote access
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/login/signout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mxcube/api/v0.1/ra/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"observers": []}})))
        .mount(&server)
        .await;
    let effects = ServerEffects::new(client_for(&server), Arc::new(RecordingChat::default()));

    // WHEN/THEN: Each effect maps to its mutation
    assert_eq!(effects.handle(&Effect::SignOut).await, vec![Mutation::SignedOut]);
    assert_eq!(
        effects.handle(&Effect::FetchRemoteAccess).await,
        vec![Mutation::SetRemoteAccess(json!({"observers": []}))]
    );
}

/// **VALUE**: Verifies a failed effect yields no mutations instead of an error.
///
/// **BUG THIS CATCHES**: Would catch a failing HTTP call stopping the effect runner.
#[tokio::test]
async fn given_failing_server_when_effect_handled_then_no_mutations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let effects = ServerEffects::new(client_for(&server), Arc::new(RecordingChat::default()));

    assert!(effects.handle(&Effect::FetchLoginInfo).await.is_empty());
    assert!(effects.handle(&Effect::RefreshScContents).await.is_empty());
}

/// **VALUE**: Verifies chat effects go to the chat sink without any HTTP traffic.
#[tokio::test]
async fn given_chat_effect_when_handled_then_sink_receives_text() {
    let server = MockServer::start().await;
    let chat = Arc::new(RecordingChat::default());
    let effects = ServerEffects::new(client_for(&server), chat.clone());

    let mutations = effects
        .handle(&Effect::ShowChatMessage("**bob**: hello".to_string()))
        .await;

    assert!(mutations.is_empty());
    assert_eq!(*chat.lines.lock().expect("chat lock"), vec!["**bob**: hello".to_string()]);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
