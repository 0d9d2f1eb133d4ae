//! Session identity records: who is logged in, who holds control.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Identifier of a node in the experiment queue.
///
/// The server sends queue ids as integers in some payloads and as strings in
/// others; both normalize to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract a node id from a JSON value holding a string or an integer.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self(text.clone())),
            Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => NodeId(text),
            Raw::Number(number) => NodeId(number.to_string()),
        })
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts `true`/`false`, `"true"`/`""`, `1`/`0` and `null`.
///
/// Anonymous login info reports `inControl` as an empty string.
pub(crate) fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => false,
        Some(Raw::Bool(flag)) => flag,
        Some(Raw::Number(number)) => number != 0,
        Some(Raw::Text(text)) => matches!(text.as_str(), "true" | "True" | "1"),
    })
}

/// Reads JSON `null` as the type's default.
///
/// User records are built from nullable database columns; a missing value is
/// not a malformed one.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A logged-in user as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUser {
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(rename = "isstaff", deserialize_with = "loose_bool")]
    pub is_staff: bool,
    #[serde(deserialize_with = "loose_bool")]
    pub in_control: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
}

impl SessionUser {
    pub fn has_identity(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Response of the login-info endpoint; the identity partition of client state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginInfo {
    pub synchrotron_name: String,
    pub beamline_name: String,
    #[serde(deserialize_with = "loose_bool")]
    pub logged_in: bool,
    pub login_type: String,
    pub proposal_list: Vec<Value>,
    pub root_path: String,
    pub user: SessionUser,
    pub selected_proposal: String,
    #[serde(rename = "selectedProposalID")]
    pub selected_proposal_id: Value,
}
