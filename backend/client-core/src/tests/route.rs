// Unit tests for event parsing and routing rules

use crate::effects::Effect;
use crate::router::{Action, NoSnapshot, ServerEvent, SnapshotSource, route};
use crate::state::mutation::Mutation;
use crate::state::tree::{AbortAction, AppState, NodeDisplay};
use crate::transport::{Acknowledger, Channel};

use models::payloads::TaskRecord;
use models::{NodeId, SessionUser};

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

// ============================================
// HELPERS
// ============================================

fn parse(channel: Channel, name: &str, payload: Value) -> ServerEvent {
    ServerEvent::parse(channel, name, vec![payload])
        .expect("payload should parse")
        .expect("event should be routed")
}

fn hwr(name: &str, payload: Value) -> ServerEvent {
    parse(Channel::Hardware, name, payload)
}

fn state_with_node(id: &str, collapsed: bool) -> AppState {
    let mut state = AppState::default();
    state
        .shared
        .queue_gui
        .display_data
        .insert(NodeId::new(id), NodeDisplay { collapsed });
    state
}

fn state_with_user(username: &str, in_control: bool) -> AppState {
    let mut state = AppState::default();
    state.login.info.user = SessionUser {
        username: username.to_string(),
        nickname: username.to_string(),
        in_control,
        ..SessionUser::default()
    };
    state
}

fn task_event(id: &str, task_state: i64) -> ServerEvent {
    hwr(
        "task",
        json!({"sample": "1:01", "taskIndex": 0, "state": task_state, "progress": 1.0, "queueID": id}),
    )
}

/// Acknowledger that records what it was called with, plus the shared log.
fn recording_ack(log: &Arc<Mutex<Vec<String>>>) -> Acknowledger {
    let log = Arc::clone(log);
    Acknowledger::new(move |args| {
        log.lock().expect("log lock").push(format!("ack {}", Value::Array(args)));
    })
}

fn mutations(actions: &[Action]) -> Vec<&Mutation> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Mutation(mutation) => Some(mutation),
            Action::Effect(_) => None,
        })
        .collect()
}

fn apply_all(state: &mut AppState, actions: &[Action]) {
    for mutation in mutations(actions) {
        state.apply(mutation);
    }
}

// ============================================
// PARSING
// ============================================

/// **VALUE**: Verifies unknown event names are ignored rather than reported.
///
/// **WHY THIS MATTERS**: Servers add events faster than clients learn them; an unknown name
/// must be a silent no-op.
///
/// **BUG THIS CATCHES**: Would catch a catch-all arm that errors or routes unknown events.
#[test]
fn given_unknown_event_name_when_parsed_then_none() {
    let parsed = ServerEvent::parse(Channel::Hardware, "brand_new_event", vec![json!({})])
        .expect("unknown names are not errors");

    assert_eq!(parsed, None);
}

/// **VALUE**: Verifies routing is keyed on channel and name together.
///
/// **WHY THIS MATTERS**: `log_record` only exists on the logging channel; the same name on
/// another channel must not be treated as a log line.
///
/// **BUG THIS CATCHES**: Would catch matching on the event name alone.
#[test]
fn given_event_on_wrong_channel_when_parsed_then_none() {
    let parsed = ServerEvent::parse(Channel::Hardware, "log_record", vec![json!({})])
        .expect("not an error");
    assert_eq!(parsed, None);

    let parsed = ServerEvent::parse(Channel::Logging, "log_record", vec![json!({"message": "hi"})])
        .expect("valid record");
    assert!(matches!(parsed, Some(ServerEvent::LogRecord(_))));
}

/// **VALUE**: Verifies a malformed payload is an error for that event only.
///
/// **WHY THIS MATTERS**: The router logs and drops it; the rest of the channel keeps working.
///
/// **BUG THIS CATCHES**: Would catch payload decoding that panics or defaults silently.
#[test]
fn given_malformed_task_payload_when_parsed_then_payload_error() {
    let result = ServerEvent::parse(Channel::Hardware, "task", vec![json!({"state": "running"})]);

    let error = result.expect_err("missing queueID and bad state must fail");
    assert!(error.to_string().contains("task"));
}

// ============================================
// TASK COLLAPSE RULE
// ============================================

/// **VALUE**: Verifies entering "running" only toggles a collapsed node.
///
/// **WHY THIS MATTERS**: An expanded running node must stay expanded; a collapsed one opens.
///
/// **BUG THIS CATCHES**: Would catch an unconditional toggle on every task event.
#[test]
fn given_running_task_when_routed_then_toggle_depends_on_collapsed_flag() {
    // GIVEN: Same running event against an expanded and a collapsed node
    let expanded = state_with_node("7", false);
    let collapsed = state_with_node("7", true);

    // WHEN: Routing
    let on_expanded = route(task_event("7", TaskRecord::STATE_RUNNING), None, &expanded, &NoSnapshot);
    let on_collapsed = route(task_event("7", TaskRecord::STATE_RUNNING), None, &collapsed, &NoSnapshot);

    // THEN: Only the collapsed node is toggled; the result is always recorded
    assert!(!mutations(&on_expanded)
        .iter()
        .any(|m| matches!(m, Mutation::CollapseItem(_))));
    assert!(matches!(mutations(&on_expanded)[..], [Mutation::AddTaskResult(_)]));

    assert!(matches!(
        mutations(&on_collapsed)[..],
        [Mutation::CollapseItem(_), Mutation::AddTaskResult(_)]
    ));
}

/// **VALUE**: Verifies replaying a finished event never toggles twice.
///
/// **WHY THIS MATTERS**: The server may resend the final task state; the node must not
/// flap between collapsed and expanded.
///
/// **BUG THIS CATCHES**: Would catch a rule not gated on the stored flag.
#[test]
fn given_finished_task_replayed_when_routed_then_collapses_once() {
    // GIVEN: An expanded node
    let mut state = state_with_node("7", false);

    // WHEN: The finished event is routed and applied twice
    let first = route(task_event("7", TaskRecord::STATE_FINISHED), None, &state, &NoSnapshot);
    apply_all(&mut state, &first);
    let second = route(task_event("7", TaskRecord::STATE_FINISHED), None, &state, &NoSnapshot);
    apply_all(&mut state, &second);

    // THEN: Collapsed exactly once
    assert!(matches!(mutations(&first)[0], Mutation::CollapseItem(_)));
    assert!(!mutations(&second)
        .iter()
        .any(|m| matches!(m, Mutation::CollapseItem(_))));
    assert!(state.shared.queue_gui.display_data[&NodeId::new("7")].collapsed);
}

/// **VALUE**: Verifies unknown nodes produce nothing but are still acknowledged.
///
/// **WHY THIS MATTERS**: The server blocks on the ack; skipping it for unknown nodes
/// would stall the queue.
///
/// **BUG THIS CATCHES**: Would catch the ack being sent only on the happy path.
#[test]
fn given_task_for_unknown_node_when_routed_then_acked_without_mutation() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let actions = route(
        task_event("99", TaskRecord::STATE_RUNNING),
        Some(recording_ack(&log)),
        &AppState::default(),
        &NoSnapshot,
    );

    assert!(actions.is_empty());
    assert_eq!(*log.lock().expect("log lock"), vec!["ack []".to_string()]);
}

/// **VALUE**: Verifies a null task index suppresses the update for a known node.
///
/// **WHY THIS MATTERS**: Results without an index cannot be matched to a task row.
///
/// **BUG THIS CATCHES**: Would catch recording results keyed on a missing index.
#[test]
fn given_task_without_index_when_routed_then_no_mutation() {
    let state = state_with_node("7", true);
    let event = hwr(
        "task",
        json!({"sample": "1:01", "taskIndex": null, "state": 1, "queueID": 7}),
    );

    assert!(route(event, None, &state, &NoSnapshot).is_empty());
}

// ============================================
// SAMPLE CHANGER
// ============================================

/// **VALUE**: Verifies `loadReady` yields a non-loading "SC Ready" notice bound to stop-queue.
///
/// **WHY THIS MATTERS**: The notice's cancel button must stop the queue, never do nothing.
///
/// **BUG THIS CATCHES**: Would catch the abort action being dropped for non-loading notices.
#[test]
fn given_load_ready_signal_when_routed_then_ready_notice_with_stop_queue() {
    let event = hwr("sc", json!({"signal": "loadReady", "message": "done"}));

    let actions = route(event, None, &AppState::default(), &NoSnapshot);

    let [Action::Mutation(Mutation::SetLoading(notice))] = &actions[..] else {
        panic!("expected one SetLoading, got {actions:?}");
    };
    assert!(!notice.loading);
    assert_eq!(notice.title, "SC Ready");
    assert_eq!(notice.message, "done");
    assert_eq!(notice.abort, Some(AbortAction::StopQueue));
    assert!(notice.abortable());
}

/// **VALUE**: Verifies load signals name the sample location.
///
/// **BUG THIS CATCHES**: Would catch loading and unloading titles being swapped.
#[test]
fn given_loading_and_unloading_signals_when_routed_then_titles_name_location() {
    let title = |signal: &str| {
        let event = hwr("sc", json!({"signal": signal, "location": "2:05"}));
        match &route(event, None, &AppState::default(), &NoSnapshot)[..] {
            [Action::Mutation(Mutation::SetLoading(notice))] => (notice.loading, notice.title.clone()),
            other => panic!("unexpected actions {other:?}"),
        }
    };

    assert_eq!(title("loadingSample"), (true, "Loading sample 2:05".to_string()));
    assert_eq!(title("loadedSample"), (true, "Loading sample 2:05".to_string()));
    assert_eq!(title("unLoadingSample"), (true, "Unloading sample 2:05".to_string()));
    assert_eq!(title("inSafeArea"), (false, "SC Safe".to_string()));
}

/// **VALUE**: Verifies unknown sample-changer signals are no-ops.
///
/// **BUG THIS CATCHES**: Would catch a default notice being raised for new signals.
#[test]
fn given_unknown_sc_signal_when_routed_then_nothing() {
    let event = hwr("sc", json!({"signal": "unknownFoo"}));

    assert!(route(event, None, &AppState::default(), &NoSnapshot).is_empty());
}

// ============================================
// CONTROL, OBSERVERS AND CHAT
// ============================================

/// **VALUE**: Verifies the gained-control notice precedes both re-fetches, in order.
///
/// **WHY THIS MATTERS**: The notice is a local hint; the re-fetched login info is the truth
/// and must land after it.
///
/// **BUG THIS CATCHES**: Would catch missing re-fetches or reordered actions.
#[test]
fn given_local_user_named_operator_when_observers_changed_then_gained_notice_then_refetch() {
    // GIVEN: Local user "alice" without control
    let state = state_with_user("alice", false);
    let event = hwr(
        "observersChanged",
        json!({"observers": [{"username": "bob"}], "operator": {"username": "alice"}, "message": "Take it"}),
    );

    // WHEN: Routing
    let actions = route(event, None, &state, &NoSnapshot);

    // THEN: Notice, then remote access, then login info
    let [
        Action::Mutation(Mutation::SetLoading(notice)),
        Action::Effect(Effect::FetchRemoteAccess),
        Action::Effect(Effect::FetchLoginInfo),
    ] = &actions[..]
    else {
        panic!("unexpected actions {actions:?}");
    };
    assert_eq!(notice.title, "You were given control");
    assert_eq!(notice.message, "Take it");
}

/// **VALUE**: Verifies an in-control user listed as observer is told they lost control.
///
/// **BUG THIS CATCHES**: Would catch the lost-control branch checking the operator instead.
#[test]
fn given_controlling_user_listed_as_observer_when_observers_changed_then_lost_notice() {
    let state = state_with_user("alice", true);
    let event = hwr(
        "observersChanged",
        json!({"observers": [{"username": "alice"}], "operator": {"username": "bob"}}),
    );

    let actions = route(event, None, &state, &NoSnapshot);

    assert!(matches!(
        &actions[0],
        Action::Mutation(Mutation::SetLoading(notice)) if notice.title == "You lost control"
    ));
    assert_eq!(actions.len(), 3);
}

/// **VALUE**: Verifies an empty observer list never announces a control change.
///
/// **WHY THIS MATTERS**: The server also pushes `observersChanged` with no observers as a plain
/// refresh; naming the local user as operator there is not a handover.
///
/// **BUG THIS CATCHES**: Would catch the gained-control notice firing on every refresh.
#[test]
fn given_empty_observer_list_when_local_user_is_operator_then_only_refetch() {
    // GIVEN: Local user "me" without control, named operator with nobody observing
    let state = state_with_user("me", false);
    let event = hwr(
        "observersChanged",
        json!({"observers": [], "operator": {"username": "me"}}),
    );

    // WHEN: Routing
    let actions = route(event, None, &state, &NoSnapshot);

    // THEN: No notice, just the two re-fetches
    assert_eq!(
        actions,
        vec![
            Action::Effect(Effect::FetchRemoteAccess),
            Action::Effect(Effect::FetchLoginInfo)
        ]
    );
}

/// **VALUE**: Verifies observer records with null columns still trigger the re-fetch.
///
/// **WHY THIS MATTERS**: Observer dicts come from nullable database columns. Rejecting the
/// payload would skip the remote-access and login-info refresh.
///
/// **BUG THIS CATCHES**: Would catch string fields that accept missing keys but not `null`.
#[test]
fn given_observer_with_null_fields_when_observers_changed_then_refetch() {
    let state = state_with_user("alice", false);
    let event = hwr(
        "observersChanged",
        json!({
            "observers": [{"username": "carol", "nickname": null, "ip": null, "email": null}],
            "operator": {"username": "bob", "nickname": null}
        }),
    );

    let actions = route(event, None, &state, &NoSnapshot);

    assert_eq!(
        actions,
        vec![
            Action::Effect(Effect::FetchRemoteAccess),
            Action::Effect(Effect::FetchLoginInfo)
        ]
    );
}

/// **VALUE**: Verifies unrelated observer changes still re-fetch authoritative state.
///
/// **BUG THIS CATCHES**: Would catch re-fetching only when a notice is shown.
#[test]
fn given_unrelated_observer_change_when_routed_then_only_refetch() {
    let state = state_with_user("alice", false);
    let event = hwr(
        "observersChanged",
        json!({"observers": [{"username": "carol"}], "operator": {"username": "bob"}}),
    );

    let actions = route(event, None, &state, &NoSnapshot);

    assert_eq!(
        actions,
        vec![
            Action::Effect(Effect::FetchRemoteAccess),
            Action::Effect(Effect::FetchLoginInfo)
        ]
    );
}

/// **VALUE**: Verifies the local user's own chat lines are not echoed or counted.
///
/// **WHY THIS MATTERS**: The sender already rendered the message when it was typed.
///
/// **BUG THIS CATCHES**: Would catch the username comparison being inverted.
#[test]
fn given_chat_messages_when_routed_then_only_foreign_ones_are_shown() {
    let state = state_with_user("alice", true);
    let own = hwr(
        "ra_chat_message",
        json!({"username": "alice", "nickname": "Alice", "date": "12:00", "message": "hi"}),
    );
    let foreign = hwr(
        "ra_chat_message",
        json!({"username": "bob", "nickname": "Bob", "date": "12:01", "message": "hello"}),
    );

    assert!(route(own, None, &state, &NoSnapshot).is_empty());
    assert_eq!(
        route(foreign, None, &state, &NoSnapshot),
        vec![
            Action::Effect(Effect::ShowChatMessage(
                "12:01 **Bob:** \n\n hello".to_string()
            )),
            Action::Mutation(Mutation::IncChatMessageCount),
        ]
    );
}

/// **VALUE**: Verifies observer login text falls back when identity is incomplete.
///
/// **BUG THIS CATCHES**: Would catch "** ** () connected." being shown for half-known observers.
#[test]
fn given_observer_login_with_and_without_ip_when_routed_then_texts_differ() {
    let full = hwr("observerLogin", json!({"nickname": "Bob", "ip": "10.0.0.2"}));
    let partial = hwr("observerLogin", json!({"nickname": "Bob"}));
    let null_ip = hwr("observerLogin", json!({"nickname": "Bob", "ip": null}));
    let logout = hwr("observerLogout", json!({"nickname": "Bob", "ip": "10.0.0.2"}));
    let state = AppState::default();

    assert_eq!(
        route(full, None, &state, &NoSnapshot),
        vec![Action::Effect(Effect::ShowChatMessage("**Bob** (10.0.0.2) connected.".to_string()))]
    );
    assert_eq!(
        route(partial, None, &state, &NoSnapshot),
        vec![Action::Effect(Effect::ShowChatMessage("Bob connecting ...".to_string()))]
    );
    assert_eq!(
        route(null_ip, None, &state, &NoSnapshot),
        vec![Action::Effect(Effect::ShowChatMessage("Bob connecting ...".to_string()))]
    );
    assert_eq!(
        route(logout, None, &state, &NoSnapshot),
        vec![Action::Effect(Effect::ShowChatMessage("**Bob** (10.0.0.2) disconnected.".to_string()))]
    );
}

/// **VALUE**: Verifies forced sign-out spares the user in control.
///
/// **BUG THIS CATCHES**: Would catch signing out the operator along with observers.
#[test]
fn given_force_signout_when_routed_then_only_observers_sign_out() {
    let event = || ServerEvent::parse(Channel::Hardware, "forceSignoutObservers", Vec::new())
        .expect("no payload needed")
        .expect("routed");

    assert!(route(event(), None, &state_with_user("alice", true), &NoSnapshot).is_empty());
    assert_eq!(
        route(event(), None, &state_with_user("bob", false), &NoSnapshot),
        vec![Action::Effect(Effect::SignOut)]
    );
}

// ============================================
// MISC EVENTS
// ============================================

struct FixedSnapshot;

impl SnapshotSource for FixedSnapshot {
    fn take_snapshot(&self) -> Value {
        json!("data:image/jpeg;base64,AAAA")
    }
}

/// **VALUE**: Verifies snapshot requests are answered through the ack.
///
/// **BUG THIS CATCHES**: Would catch the snapshot being stored as state instead of returned.
#[test]
fn given_snapshot_request_when_routed_then_ack_carries_snapshot() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let event = ServerEvent::parse(Channel::Hardware, "take_xtal_snapshot", Vec::new())
        .expect("parses")
        .expect("routed");

    let actions = route(event, Some(recording_ack(&log)), &AppState::default(), &FixedSnapshot);

    assert!(actions.is_empty());
    assert_eq!(
        *log.lock().expect("log lock"),
        vec![r#"ack ["data:image/jpeg;base64,AAAA"]"#.to_string()]
    );
}

/// **VALUE**: Verifies the two centring methods produce their overlays.
///
/// **BUG THIS CATCHES**: Would catch click-centring mode starting for automatic centring.
#[test]
fn given_centring_methods_when_routed_then_overlay_matches_method() {
    let state = AppState::default();
    let manual = route(hwr("sample_centring", json!({"method": "Manual 3-click"})), None, &state, &NoSnapshot);
    let auto = route(hwr("sample_centring", json!({"method": "Loop"})), None, &state, &NoSnapshot);

    assert!(matches!(mutations(&manual)[..], [Mutation::StartClickCentring, Mutation::VideoMessageOverlay { .. }]));
    assert!(matches!(
        mutations(&auto)[..],
        [Mutation::VideoMessageOverlay { show: true, message }] if message.starts_with("Auto loop centring")
    ));
}

/// **VALUE**: Verifies `plot_end` appends its last chunk before ending the plot.
///
/// **BUG THIS CATCHES**: Would catch the final data chunk being discarded.
#[test]
fn given_plot_end_when_routed_and_applied_then_plot_has_data_and_is_ended() {
    let mut state = AppState::default();
    let data = route(hwr("plot_data", json!({"id": 4, "data": [1, 2]})), None, &state, &NoSnapshot);
    apply_all(&mut state, &data);
    let end = route(hwr("plot_end", json!({"id": "4", "data": [3]})), None, &state, &NoSnapshot);
    apply_all(&mut state, &end);

    let plot = &state.plots.plots[&NodeId::new("4")];
    assert_eq!(plot.data, vec![json!([1, 2]), json!([3])]);
    assert!(plot.ended);
}

/// **VALUE**: Verifies `DisableSample` unchecks the sample instead of setting queue status.
///
/// **BUG THIS CATCHES**: Would catch "DisableSample" leaking into the queue status string.
#[test]
fn given_queue_signals_when_routed_then_disable_sample_is_special_cased() {
    let state = AppState::default();
    let disable = route(hwr("queue", json!({"Signal": "DisableSample", "sampleID": "1:02"})), None, &state, &NoSnapshot);
    let running = route(hwr("queue", json!({"Signal": "QueueStarted"})), None, &state, &NoSnapshot);

    assert_eq!(
        disable,
        vec![Action::Mutation(Mutation::SetSampleAttribute {
            sample_id: "1:02".to_string(),
            attribute: "checked".to_string(),
            value: json!(false),
        })]
    );
    assert_eq!(
        running,
        vec![Action::Mutation(Mutation::SetQueueStatus("QueueStarted".to_string()))]
    );
}

/// **VALUE**: Verifies the sample-changer contents push triggers a refresh effect.
///
/// **BUG THIS CATCHES**: Would catch the push being treated as the contents themselves.
#[test]
fn given_sc_contents_update_when_routed_then_refresh_effect() {
    let event = ServerEvent::parse(Channel::Hardware, "sc_contents_update", Vec::new())
        .expect("parses")
        .expect("routed");

    assert_eq!(
        route(event, None, &AppState::default(), &NoSnapshot),
        vec![Action::Effect(Effect::RefreshScContents)]
    );
}
