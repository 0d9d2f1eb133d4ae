//! The page origin every realtime channel and REST endpoint hangs off.

pub mod builder;

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// Engine.IO protocol revision spoken by the instrument server.
pub const ENGINE_IO_PROTOCOL: u8 = 4;

/// Path the Socket.IO server is mounted on.
pub const SOCKET_IO_PATH: &str = "socket.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// WebSocket scheme matching this HTTP scheme.
    pub fn websocket(&self) -> &'static str {
        match self {
            Scheme::Http => "ws",
            Scheme::Https => "wss",
        }
    }
}

/// Scheme, host and port of the instrument server.
///
/// Build through [`ServerOriginBuilder`](builder::ServerOriginBuilder) so the
/// host is never empty and the port never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOrigin {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl ServerOrigin {
    /// `http://host:port/`, the base for REST calls.
    pub fn http_base(&self) -> String {
        format!("{}://{}:{}/", self.scheme.as_str(), self.host, self.port)
    }

    /// Endpoint of one logical channel, e.g. `http://host:port/hwr`.
    pub fn channel_endpoint(&self, namespace: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            namespace
        )
    }

    /// URL of the shared realtime connection all channels are multiplexed over.
    pub fn socket_url(&self) -> String {
        format!(
            "{}://{}:{}/{SOCKET_IO_PATH}/?EIO={ENGINE_IO_PROTOCOL}&transport=websocket",
            self.scheme.websocket(),
            self.host,
            self.port
        )
    }
}

impl Display for ServerOrigin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(
            formatter,
            "{}://{}:{}",
            self.scheme.as_str(),
            self.host,
            self.port
        )
    }
}
