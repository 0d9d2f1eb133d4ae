//! Engine.IO v4 and Socket.IO v5 text packet codec.
//!
//! Engine frame: `<type digit><payload>`. A message frame (`4`) carries one
//! Socket.IO packet: `<type>[<attachments>-][<nsp>,][<ack id>][<json>]`.

use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const ROOT_NAMESPACE: &str = "/";

/// Handshake carried by the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    #[track_caller]
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| TransportError::Codec {
            message: "Empty engine packet".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let payload = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(payload)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(payload.to_string())),
            '3' => Ok(EnginePacket::Pong(payload.to_string())),
            '4' => Ok(EnginePacket::Message(payload.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(TransportError::Codec {
                message: format!("Unknown engine packet type '{other}'"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Serializing a plain struct of strings and integers cannot fail.
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(payload) => format!("4{payload}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketType {
    fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(PacketType::Connect),
            '1' => Some(PacketType::Disconnect),
            '2' => Some(PacketType::Event),
            '3' => Some(PacketType::Ack),
            '4' => Some(PacketType::ConnectError),
            '5' => Some(PacketType::BinaryEvent),
            '6' => Some(PacketType::BinaryAck),
            _ => None,
        }
    }

    fn digit(&self) -> char {
        match self {
            PacketType::Connect => '0',
            PacketType::Disconnect => '1',
            PacketType::Event => '2',
            PacketType::Ack => '3',
            PacketType::ConnectError => '4',
            PacketType::BinaryEvent => '5',
            PacketType::BinaryAck => '6',
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, PacketType::BinaryEvent | PacketType::BinaryAck)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketType,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: PacketType::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: PacketType::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// EVENT packet whose data array is `[name, ...args]`.
    pub fn event(namespace: &str, name: &str, args: Vec<Value>, ack_id: Option<u64>) -> Self {
        let mut data = Vec::with_capacity(args.len() + 1);
        data.push(Value::String(name.to_string()));
        data.extend(args);

        Self {
            kind: PacketType::Event,
            namespace: namespace.to_string(),
            ack_id,
            data: Some(Value::Array(data)),
        }
    }

    pub fn ack(namespace: &str, ack_id: u64, args: Vec<Value>) -> Self {
        Self {
            kind: PacketType::Ack,
            namespace: namespace.to_string(),
            ack_id: Some(ack_id),
            data: Some(Value::Array(args)),
        }
    }

    #[track_caller]
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        let mut rest = text;

        let kind = rest
            .chars()
            .next()
            .and_then(PacketType::from_digit)
            .ok_or_else(|| TransportError::Codec {
                message: format!("Invalid socket packet type in '{text}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        rest = &rest[1..];

        if kind.is_binary() {
            // Attachment count; the attachments themselves arrive as separate binary frames.
            if let Some(dash) = rest.find('-') {
                rest = &rest[dash + 1..];
            }
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(comma) => {
                    let namespace = &rest[..comma];
                    rest = &rest[comma + 1..];
                    namespace
                }
                None => {
                    let namespace = rest;
                    rest = "";
                    namespace
                }
            }
        } else {
            ROOT_NAMESPACE
        };

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| TransportError::Codec {
                    message: format!("Invalid ack id in '{text}': {e}"),
                    location: ErrorLocation::from(Location::caller()),
                })?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace: namespace.to_string(),
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());

        if self.namespace != ROOT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }

        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }

        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }

        out
    }

    /// Wrap in an Engine.IO message frame, ready for the socket.
    pub fn into_frame(self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }

    /// Split an EVENT data array into its name and arguments.
    pub fn event_parts(self) -> Option<(String, Vec<Value>)> {
        match self.data {
            Some(Value::Array(mut items)) if !items.is_empty() => match items.remove(0) {
                Value::String(name) => Some((name, items)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Arguments of an ACK packet.
    pub fn ack_args(self) -> Vec<Value> {
        match self.data {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }
}
