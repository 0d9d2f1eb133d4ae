use crate::state::tree::{EnergyScan, LoadingNotice};

use models::payloads::{BeamlineAttribute, LogRecord, TaskLimsData, TaskRecord};
use models::{LoginInfo, NodeId};

use serde_json::{Map, Value};

/// A described state change, applied exactly once by the store.
///
/// Application is not idempotent in general: `IncChatMessageCount` and
/// `CollapseItem` change state every time they are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddUserMessage(LogRecord),
    AddLogRecord(LogRecord),
    IncChatMessageCount,

    SaveMotorPosition { name: String, position: Option<f64> },
    UpdateMotorState { name: String, state: Value },
    SetShapes(Map<String, Value>),
    UpdateShapes(Vec<Value>),
    SetPixelsPerMm(Vec<f64>),
    SetBeamInfo(Value),
    SetCurrentPhase(String),
    StartClickCentring,
    VideoMessageOverlay { show: bool, message: String },

    SetMachInfo(Value),
    SetBeamlineAttribute(BeamlineAttribute),
    SetEnergyScanResult(EnergyScan),

    UpdateTaskLimsData(TaskLimsData),
    /// Toggle the collapsed flag of a queue node.
    CollapseItem(NodeId),
    AddTaskResult(TaskRecord),
    AddTasks(Vec<Value>),
    AddDiffractionPlan(Vec<Value>),
    SetSampleAttribute { sample_id: String, attribute: String, value: Value },
    SetQueueStatus(String),
    SetCurrentSample(String),

    SetLoading(LoadingNotice),
    ShowConnectionLostDialog(bool),
    ShowResumeQueueDialog(bool),
    ShowWorkflowParametersDialog(Value),

    SetActionState { name: String, state: Value, data: Value },
    SetScState(Value),
    SetLoadedSample(Value),
    SetScGlobalState(Value),
    SetScContents(Value),

    NewPlot(Value),
    PlotData { id: NodeId, data: Value, end: bool },
    PlotEnd(NodeId),

    SetRemoteAccess(Value),
    SetLoginInfo(LoginInfo),
    SignedOut,
}
