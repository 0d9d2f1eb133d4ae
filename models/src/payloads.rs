//! Payloads carried by server-pushed events.
//!
//! Field names follow the server's JSON (mostly camelCase, a few legacy
//! spellings such as `queueID` and `Signal`). Values whose shape is owned by
//! the view layer stay as [`serde_json::Value`].

use crate::session::{NodeId, SessionUser, null_as_default};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record from the server-side logging handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    pub message: String,
    pub severity: String,
    pub timestamp: String,
    pub logger: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorPosition {
    pub name: String,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorState {
    pub name: String,
    pub state: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapesUpdate {
    #[serde(default)]
    pub shapes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelsPerMm {
    #[serde(rename = "pixelsPerMm")]
    pub pixels_per_mm: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamChanged {
    pub data: Value,
}

/// A beamline attribute update (`beamline_value_change`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamlineAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub shape: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyScanResult {
    pub pk: Value,
    pub ip: Value,
    pub rm: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLimsData {
    pub sample: String,
    pub task_index: usize,
    #[serde(default)]
    pub lims_result_data: Value,
}

/// Progress report for one queue node (`task` event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default)]
    pub sample: String,
    #[serde(default)]
    pub task_index: Option<usize>,
    pub state: i64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub lims_result_data: Value,
    #[serde(rename = "queueID")]
    pub queue_id: NodeId,
}

impl TaskRecord {
    pub const STATE_RUNNING: i64 = 1;
    pub const STATE_FINISHED: i64 = 2;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub tasks: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSignal {
    #[serde(rename = "Signal")]
    pub signal: String,
    #[serde(rename = "sampleID", default)]
    pub sample_id: Option<String>,
}

/// Sample-changer notification; `signal` selects the user-facing notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScSignal {
    pub signal: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCentring {
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserversChanged {
    pub observers: Vec<SessionUser>,
    pub operator: SessionUser,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverNotice {
    #[serde(deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamlineActionUpdate {
    pub name: String,
    pub state: Value,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSample {
    #[serde(rename = "sampleID")]
    pub sample_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChanged {
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotChunk {
    pub id: NodeId,
    #[serde(default)]
    pub data: Value,
}
