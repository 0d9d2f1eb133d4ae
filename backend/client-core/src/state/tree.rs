//! The central state tree and its slices.
//!
//! `login` is the identity partition and `shared` the collaborative one;
//! every other slice is transient and rebuilt from server pushes.

use models::payloads::{BeamlineAttribute, LogRecord, TaskRecord};
use models::{LoginInfo, NodeId};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Most recent user-facing messages kept in `general`.
pub const MAX_USER_MESSAGES: usize = 50;

/// Most recent log records kept in `logger`.
pub const MAX_LOG_RECORDS: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub login: LoginState,
    pub shared: SharedState,
    pub general: GeneralState,
    pub remote_access: RemoteAccessState,
    pub sample_view: SampleViewState,
    pub beamline: BeamlineState,
    pub sample_changer: SampleChangerState,
    pub task_result: TaskResultState,
    pub logger: LoggerState,
    pub plots: PlotState,
}

impl AppState {
    /// Whether the local operator holds exclusive control of the instrument.
    pub fn in_control(&self) -> bool {
        self.login.info.user.in_control
    }

    pub fn local_username(&self) -> &str {
        &self.login.info.user.username
    }
}

// ============================================
// PERSISTED PARTITIONS
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginState {
    pub info: LoginInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedState {
    pub queue: QueueState,
    #[serde(rename = "queueGUI")]
    pub queue_gui: QueueGuiState,
    pub beamline_actions: BeamlineActionsState,
    pub workflow: WorkflowState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueState {
    pub status: String,
    pub current_sample: Option<String>,
    /// Per-sample attributes such as `checked`, keyed by sample id.
    pub samples: BTreeMap<String, Map<String, Value>>,
    pub tasks: BTreeMap<NodeId, Value>,
    pub task_results: BTreeMap<NodeId, TaskRecord>,
    pub diffraction_plans: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueGuiState {
    pub display_data: BTreeMap<NodeId, NodeDisplay>,
    pub show_resume_queue_dialog: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDisplay {
    pub collapsed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamlineActionsState {
    pub actions: BTreeMap<String, ActionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionEntry {
    pub state: Value,
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowState {
    pub show_dialog: bool,
    pub parameters: Value,
}

// ============================================
// TRANSIENT SLICES
// ============================================

/// What the cancel button of a loading notice does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortAction {
    StopQueue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadingNotice {
    pub loading: bool,
    pub title: String,
    pub message: String,
    pub blocking: bool,
    pub abort: Option<AbortAction>,
}

impl LoadingNotice {
    pub fn abortable(&self) -> bool {
        self.abort.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralState {
    pub loading: Option<LoadingNotice>,
    pub show_connection_lost_dialog: bool,
    pub user_messages: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAccessState {
    pub chat_message_count: u64,
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorEntry {
    pub position: Option<f64>,
    pub state: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleViewState {
    pub motors: BTreeMap<String, MotorEntry>,
    pub shapes: Map<String, Value>,
    pub pixels_per_mm: Vec<f64>,
    pub beam_info: Value,
    pub current_phase: String,
    pub click_centring: bool,
    pub video_message_overlay: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeamlineState {
    pub attributes: BTreeMap<String, BeamlineAttribute>,
    pub mach_info: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleChangerState {
    pub state: Value,
    pub loaded_sample: Value,
    pub global_state: Value,
    pub contents: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyScan {
    pub pk: Value,
    pub ip: Value,
    pub rm: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResultState {
    pub energy_scan: Option<EnergyScan>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggerState {
    pub records: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plot {
    pub info: Value,
    pub data: Vec<Value>,
    pub ended: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotState {
    pub plots: BTreeMap<NodeId, Plot>,
}
