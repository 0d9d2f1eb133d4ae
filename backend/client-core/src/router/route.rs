use crate::effects::Effect;
use crate::router::event::ServerEvent;
use crate::state::mutation::Mutation;
use crate::state::tree::{AbortAction, AppState, EnergyScan, LoadingNotice};
use crate::transport::Acknowledger;

use models::payloads::{ChatMessage, ObserverNotice, ObserversChanged, ScSignal, TaskRecord};

use log::trace;
use serde_json::Value;

/// Centring method that switches the sample view into click-centring mode.
pub const CLICK_CENTRING: &str = "Manual 3-click";

const CLICK_CENTRING_OVERLAY: &str =
    "3-Click Centring: <br /> Select centered position or center";
const AUTO_CENTRING_OVERLAY: &str = "Auto loop centring: <br /> Save position or re-center";

/// One outcome of routing an event, kept in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Mutation(Mutation),
    Effect(Effect),
}

/// Supplies the crystal snapshot requested by `take_xtal_snapshot`.
pub trait SnapshotSource: Send + Sync {
    fn take_snapshot(&self) -> Value;
}

/// Answers snapshot requests with `null`, for clients without a camera view.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshot;

impl SnapshotSource for NoSnapshot {
    fn take_snapshot(&self) -> Value {
        Value::Null
    }
}

/// Map one event to the actions it causes, given the current state.
///
/// Acknowledgements required by the protocol are sent before any action is
/// produced.
pub fn route(
    event: ServerEvent,
    ack: Option<Acknowledger>,
    state: &AppState,
    snapshots: &dyn SnapshotSource,
) -> Vec<Action> {
    use Action::{Effect as Do, Mutation as Set};

    match event {
        ServerEvent::LogRecord(record) => vec![
            Set(Mutation::AddUserMessage(record.clone())),
            Set(Mutation::AddLogRecord(record)),
        ],

        ServerEvent::ChatMessage(message) => chat_message(message, state),

        ServerEvent::MotorPosition(motor) => vec![Set(Mutation::SaveMotorPosition {
            name: motor.name,
            position: motor.position,
        })],
        ServerEvent::MotorState(motor) => vec![Set(Mutation::UpdateMotorState {
            name: motor.name,
            state: motor.state,
        })],
        ServerEvent::UpdateShapes(update) => vec![Set(Mutation::SetShapes(update.shapes))],
        ServerEvent::GridResultAvailable(result) => {
            vec![Set(Mutation::UpdateShapes(vec![result.shape]))]
        }
        ServerEvent::PixelsPerMm(pixels) => {
            vec![Set(Mutation::SetPixelsPerMm(pixels.pixels_per_mm))]
        }
        ServerEvent::BeamChanged(beam) => vec![Set(Mutation::SetBeamInfo(beam.data))],
        ServerEvent::DiffPhaseChanged(phase) => vec![Set(Mutation::SetCurrentPhase(phase.phase))],

        ServerEvent::MachInfoChanged(info) => vec![Set(Mutation::SetMachInfo(info))],
        ServerEvent::BeamlineValueChange(attribute) => {
            vec![Set(Mutation::SetBeamlineAttribute(attribute))]
        }
        ServerEvent::EnergyScanResult(result) => {
            vec![Set(Mutation::SetEnergyScanResult(EnergyScan {
                pk: result.pk,
                ip: result.ip,
                rm: result.rm,
            }))]
        }
        ServerEvent::UpdateTaskLimsData(lims) => vec![Set(Mutation::UpdateTaskLimsData(lims))],

        ServerEvent::Task(record) => {
            acknowledge(ack);
            task(record, state)
        }
        ServerEvent::AddTask(list) => {
            acknowledge(ack);
            vec![Set(Mutation::AddTasks(list.tasks))]
        }
        ServerEvent::AddDiffPlan(list) => {
            acknowledge(ack);
            vec![Set(Mutation::AddDiffractionPlan(list.tasks))]
        }
        ServerEvent::Queue(queue) => {
            acknowledge(ack);
            if queue.signal == "DisableSample" {
                match queue.sample_id {
                    Some(sample_id) => vec![Set(Mutation::SetSampleAttribute {
                        sample_id,
                        attribute: "checked".to_string(),
                        value: Value::Bool(false),
                    })],
                    None => Vec::new(),
                }
            } else {
                vec![Set(Mutation::SetQueueStatus(queue.signal))]
            }
        }

        ServerEvent::SampleChanger(signal) => sample_changer_notice(&signal)
            .map(|notice| vec![Set(Mutation::SetLoading(notice))])
            .unwrap_or_default(),

        ServerEvent::SampleCentring(centring) => {
            if centring.method == CLICK_CENTRING {
                vec![
                    Set(Mutation::StartClickCentring),
                    Set(Mutation::VideoMessageOverlay {
                        show: true,
                        message: CLICK_CENTRING_OVERLAY.to_string(),
                    }),
                ]
            } else {
                vec![Set(Mutation::VideoMessageOverlay {
                    show: true,
                    message: AUTO_CENTRING_OVERLAY.to_string(),
                })]
            }
        }

        ServerEvent::ResumeQueueDialog => vec![Set(Mutation::ShowResumeQueueDialog(true))],
        ServerEvent::WorkflowParametersDialog(parameters) => {
            vec![Set(Mutation::ShowWorkflowParametersDialog(parameters))]
        }

        ServerEvent::ObserversChanged(changed) => {
            let mut actions: Vec<Action> = control_notice(&changed, state)
                .map(|notice| Set(Mutation::SetLoading(notice)))
                .into_iter()
                .collect();
            actions.push(Do(Effect::FetchRemoteAccess));
            actions.push(Do(Effect::FetchLoginInfo));
            actions
        }
        ServerEvent::ObserverLogin(observer) => {
            vec![Do(Effect::ShowChatMessage(observer_connected(&observer)))]
        }
        ServerEvent::ObserverLogout(observer) => {
            vec![Do(Effect::ShowChatMessage(format!(
                "**{}** ({}) disconnected.",
                observer.nickname, observer.ip
            )))]
        }
        ServerEvent::ForceSignoutObservers => {
            if state.in_control() {
                trace!("Ignoring forced sign-out, local user holds control");
                Vec::new()
            } else {
                vec![Do(Effect::SignOut)]
            }
        }

        ServerEvent::TakeXtalSnapshot => {
            match ack {
                Some(ack) => ack.send(vec![snapshots.take_snapshot()]),
                None => trace!("Snapshot requested without acknowledgement, ignoring"),
            }
            Vec::new()
        }

        ServerEvent::BeamlineAction(action) => vec![Set(Mutation::SetActionState {
            name: action.name,
            state: action.state,
            data: action.data,
        })],
        ServerEvent::ScState(sc_state) => vec![Set(Mutation::SetScState(sc_state))],
        ServerEvent::LoadedSampleChanged(sample) => vec![Set(Mutation::SetLoadedSample(sample))],
        ServerEvent::SetCurrentSample(sample) => {
            vec![Set(Mutation::SetCurrentSample(sample.sample_id))]
        }
        ServerEvent::ScMaintenanceUpdate(global) => vec![Set(Mutation::SetScGlobalState(global))],
        ServerEvent::ScContentsUpdate => vec![Do(Effect::RefreshScContents)],

        ServerEvent::NewPlot(info) => vec![Set(Mutation::NewPlot(info))],
        ServerEvent::PlotData(chunk) => vec![Set(Mutation::PlotData {
            id: chunk.id,
            data: chunk.data,
            end: false,
        })],
        ServerEvent::PlotEnd(chunk) => vec![
            Set(Mutation::PlotData {
                id: chunk.id.clone(),
                data: chunk.data,
                end: true,
            }),
            Set(Mutation::PlotEnd(chunk.id)),
        ],
    }
}

fn acknowledge(ack: Option<Acknowledger>) {
    if let Some(ack) = ack {
        ack.send(Vec::new());
    }
}

fn chat_message(message: ChatMessage, state: &AppState) -> Vec<Action> {
    if message.username == state.local_username() {
        return Vec::new();
    }

    vec![
        Action::Effect(Effect::ShowChatMessage(format!(
            "{} **{}:** \n\n {}",
            message.date, message.nickname, message.message
        ))),
        Action::Mutation(Mutation::IncChatMessageCount),
    ]
}

/// Known node with an index: toggle only when entering running while
/// collapsed, or finishing while expanded. Replays leave the flag alone.
fn task(record: TaskRecord, state: &AppState) -> Vec<Action> {
    let Some(display) = state.shared.queue_gui.display_data.get(&record.queue_id) else {
        trace!("Task update for unknown node {}", record.queue_id);
        return Vec::new();
    };

    if record.task_index.is_none() {
        return Vec::new();
    }

    let toggle = match record.state {
        TaskRecord::STATE_RUNNING => display.collapsed,
        s if s >= TaskRecord::STATE_FINISHED => !display.collapsed,
        _ => false,
    };

    let mut actions = Vec::with_capacity(2);
    if toggle {
        actions.push(Action::Mutation(Mutation::CollapseItem(
            record.queue_id.clone(),
        )));
    }
    actions.push(Action::Mutation(Mutation::AddTaskResult(record)));
    actions
}

fn sample_changer_notice(signal: &ScSignal) -> Option<LoadingNotice> {
    let (loading, title) = match signal.signal.as_str() {
        "operatingSampleChanger" => (true, "Sample changer in operation".to_string()),
        "loadingSample" | "loadedSample" => (true, format!("Loading sample {}", signal.location)),
        "unLoadingSample" | "unLoadedSample" => {
            (true, format!("Unloading sample {}", signal.location))
        }
        "loadReady" => (false, "SC Ready".to_string()),
        "inSafeArea" => (false, "SC Safe".to_string()),
        other => {
            trace!("Unhandled sample changer signal {other}");
            return None;
        }
    };

    Some(LoadingNotice {
        loading,
        title,
        message: signal.message.clone(),
        blocking: true,
        abort: Some(AbortAction::StopQueue),
    })
}

fn control_notice(changed: &ObserversChanged, state: &AppState) -> Option<LoadingNotice> {
    let local = &state.login.info.user;
    if !local.has_identity() {
        return None;
    }

    let notice = |title: &str, message: &str| LoadingNotice {
        loading: true,
        title: title.to_string(),
        message: message.to_string(),
        blocking: false,
        abort: None,
    };

    // An empty observer list is a bare refresh, not a handover
    if changed.observers.is_empty() {
        return None;
    }

    if changed.operator.username == local.username && !local.in_control {
        Some(notice("You were given control", &changed.message))
    } else if local.in_control
        && changed
            .observers
            .iter()
            .any(|observer| observer.username == local.username)
    {
        Some(notice("You lost control", "You lost control"))
    } else {
        None
    }
}

fn observer_connected(observer: &ObserverNotice) -> String {
    if observer.nickname.is_empty() || observer.ip.is_empty() {
        format!("{} connecting ...", observer.nickname)
    } else {
        format!("**{}** ({}) connected.", observer.nickname, observer.ip)
    }
}

