use crate::error::router::RouterError;
use crate::transport::Channel;

use common::ErrorLocation;
use models::payloads::{
    BeamChanged, BeamlineActionUpdate, BeamlineAttribute, ChatMessage, CurrentSample,
    EnergyScanResult, GridResult, LogRecord, MotorPosition, MotorState, ObserverNotice,
    ObserversChanged, PhaseChanged, PixelsPerMm, PlotChunk, QueueSignal, SampleCentring,
    ScSignal, ShapesUpdate, TaskLimsData, TaskList, TaskRecord,
};

use std::panic::Location;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Every server push the router understands, with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    LogRecord(LogRecord),

    ChatMessage(ChatMessage),
    MotorPosition(MotorPosition),
    MotorState(MotorState),
    UpdateShapes(ShapesUpdate),
    PixelsPerMm(PixelsPerMm),
    BeamChanged(BeamChanged),
    MachInfoChanged(Value),
    BeamlineValueChange(BeamlineAttribute),
    GridResultAvailable(GridResult),
    EnergyScanResult(EnergyScanResult),
    UpdateTaskLimsData(TaskLimsData),
    Task(TaskRecord),
    AddTask(TaskList),
    AddDiffPlan(TaskList),
    Queue(QueueSignal),
    SampleChanger(ScSignal),
    SampleCentring(SampleCentring),
    ResumeQueueDialog,
    ObserversChanged(ObserversChanged),
    ObserverLogout(ObserverNotice),
    ObserverLogin(ObserverNotice),
    ForceSignoutObservers,
    WorkflowParametersDialog(Value),
    TakeXtalSnapshot,
    BeamlineAction(BeamlineActionUpdate),
    ScState(Value),
    LoadedSampleChanged(Value),
    SetCurrentSample(CurrentSample),
    ScMaintenanceUpdate(Value),
    ScContentsUpdate,
    DiffPhaseChanged(PhaseChanged),
    NewPlot(Value),
    PlotData(PlotChunk),
    PlotEnd(PlotChunk),
}

impl ServerEvent {
    /// Decode an inbound event.
    ///
    /// Returns `Ok(None)` for event names the channel does not route. The
    /// ui-state `state_update` push is consumed by the remote store's own
    /// handler and never reaches this point.
    #[track_caller]
    pub fn parse(
        channel: Channel,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Option<ServerEvent>, RouterError> {
        let event = match (channel, name) {
            (Channel::Logging, "log_record") => ServerEvent::LogRecord(payload(name, args)?),

            (Channel::Hardware, "ra_chat_message") => {
                ServerEvent::ChatMessage(payload(name, args)?)
            }
            (Channel::Hardware, "motor_position") => {
                ServerEvent::MotorPosition(payload(name, args)?)
            }
            (Channel::Hardware, "motor_state") => ServerEvent::MotorState(payload(name, args)?),
            (Channel::Hardware, "update_shapes") => {
                ServerEvent::UpdateShapes(payload(name, args)?)
            }
            (Channel::Hardware, "update_pixels_per_mm") => {
                ServerEvent::PixelsPerMm(payload(name, args)?)
            }
            (Channel::Hardware, "beam_changed") => ServerEvent::BeamChanged(payload(name, args)?),
            (Channel::Hardware, "mach_info_changed") => {
                ServerEvent::MachInfoChanged(first(args))
            }
            (Channel::Hardware, "beamline_value_change") => {
                ServerEvent::BeamlineValueChange(payload(name, args)?)
            }
            (Channel::Hardware, "grid_result_available") => {
                ServerEvent::GridResultAvailable(payload(name, args)?)
            }
            (Channel::Hardware, "energy_scan_result") => {
                ServerEvent::EnergyScanResult(payload(name, args)?)
            }
            (Channel::Hardware, "update_task_lims_data") => {
                ServerEvent::UpdateTaskLimsData(payload(name, args)?)
            }
            (Channel::Hardware, "task") => ServerEvent::Task(payload(name, args)?),
            (Channel::Hardware, "add_task") => ServerEvent::AddTask(payload(name, args)?),
            (Channel::Hardware, "add_diff_plan") => ServerEvent::AddDiffPlan(payload(name, args)?),
            (Channel::Hardware, "queue") => ServerEvent::Queue(payload(name, args)?),
            (Channel::Hardware, "sc") => ServerEvent::SampleChanger(payload(name, args)?),
            (Channel::Hardware, "sample_centring") => {
                ServerEvent::SampleCentring(payload(name, args)?)
            }
            (Channel::Hardware, "resumeQueueDialog") => ServerEvent::ResumeQueueDialog,
            (Channel::Hardware, "observersChanged") => {
                ServerEvent::ObserversChanged(payload(name, args)?)
            }
            (Channel::Hardware, "observerLogout") => {
                ServerEvent::ObserverLogout(payload(name, args)?)
            }
            (Channel::Hardware, "observerLogin") => {
                ServerEvent::ObserverLogin(payload(name, args)?)
            }
            (Channel::Hardware, "forceSignoutObservers") => ServerEvent::ForceSignoutObservers,
            (Channel::Hardware, "workflowParametersDialog") => {
                ServerEvent::WorkflowParametersDialog(first(args))
            }
            (Channel::Hardware, "take_xtal_snapshot") => ServerEvent::TakeXtalSnapshot,
            (Channel::Hardware, "beamline_action") => {
                ServerEvent::BeamlineAction(payload(name, args)?)
            }
            (Channel::Hardware, "sc_state") => ServerEvent::ScState(first(args)),
            (Channel::Hardware, "loaded_sample_changed") => {
                ServerEvent::LoadedSampleChanged(first(args))
            }
            (Channel::Hardware, "set_current_sample") => {
                ServerEvent::SetCurrentSample(payload(name, args)?)
            }
            (Channel::Hardware, "sc_maintenance_update") => {
                ServerEvent::ScMaintenanceUpdate(first(args))
            }
            (Channel::Hardware, "sc_contents_update") => ServerEvent::ScContentsUpdate,
            (Channel::Hardware, "diff_phase_changed") => {
                ServerEvent::DiffPhaseChanged(payload(name, args)?)
            }
            (Channel::Hardware, "new_plot") => ServerEvent::NewPlot(first(args)),
            (Channel::Hardware, "plot_data") => ServerEvent::PlotData(payload(name, args)?),
            (Channel::Hardware, "plot_end") => ServerEvent::PlotEnd(payload(name, args)?),

            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

fn first(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Null)
}

#[track_caller]
fn payload<T: DeserializeOwned>(event: &str, args: Vec<Value>) -> Result<T, RouterError> {
    serde_json::from_value(first(args)).map_err(|e| RouterError::Payload {
        event: event.to_string(),
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}
