//! Transport multiplexer: four logical channels over one Socket.IO connection.
//!
//! The instrument server speaks Engine.IO v4 with Socket.IO v5 on top. Each
//! logical channel is a Socket.IO namespace multiplexed over a single
//! WebSocket. Only connected/disconnected transitions leave this module;
//! raw transport errors are logged and retried with exponential backoff.

pub mod ack;
pub mod channel;
pub mod multiplexer;
pub mod packet;

pub use ack::{AckFuture, Acknowledger};
pub use channel::{Channel, ChannelStatus};
pub use multiplexer::{
    ChannelHandle, ChannelPort, EventHandler, InboundFrame, InboundSink, Multiplexer,
    ReconnectPolicy, TransportEvent,
};
