//! Primitives shared by every crate in the lab control client workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): cross-cutting helpers with no domain knowledge
//! - **models**: wire payloads and session records
//! - **client-core**: the realtime synchronization layer
//! - **labconsole**: application wiring everything together

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
