//! Domain models for the lab control client.
//!
//! This crate contains pure data structures: the payloads the instrument
//! server pushes over its realtime channels, the session records describing
//! who holds control, and the validated server origin every channel endpoint
//! is derived from. Models have no business logic.
//!
//! ## Architecture
//!
//! - **models** (this crate): Pure data structures
//! - **client-core**: Synchronization logic operating on models
//! - **labconsole**: Application wiring everything together

pub mod error;
pub mod origin;
pub mod payloads;
pub mod session;

#[cfg(test)]
mod tests;

pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use origin::builder::ServerOriginBuilder;
pub use origin::{Scheme, ServerOrigin};
pub use session::{LoginInfo, NodeId, SessionUser};
