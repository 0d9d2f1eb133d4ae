//! Realtime synchronization core of the lab control client.
//!
//! Owns the multiplexed connection to the instrument server, routes pushed
//! events into the central state container, debounces connection loss and
//! persists the identity and shared partitions of state.

pub mod client;
pub mod config;
pub mod effects;
pub mod error;
pub mod monitor;
pub mod router;
pub mod state;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::SyncClient;

pub const API_PREFIX: &str = "mxcube/api/v0.1";
pub const REMOTE_ACCESS_ENDPOINT: &str = const_format::concatcp!(API_PREFIX, "/ra/");
pub const LOGIN_INFO_ENDPOINT: &str = const_format::concatcp!(API_PREFIX, "/login/login_info");
pub const SIGNOUT_ENDPOINT: &str = const_format::concatcp!(API_PREFIX, "/login/signout");
pub const QUEUE_STOP_ENDPOINT: &str = const_format::concatcp!(API_PREFIX, "/queue/stop");
pub const SC_CONTENTS_ENDPOINT: &str =
    const_format::concatcp!(API_PREFIX, "/sample_changer/contents");
