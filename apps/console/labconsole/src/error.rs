use client_core::error::CoreError;
use client_core::error::config::ConfigError;
use client_core::error::state::StateError;
use client_core::error::storage::StorageError;

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the console.
///
/// Core errors are flattened to their message so the whole enum stays
/// serializable for status reporting.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ConsoleError {
    /// Error from this App
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },

    /// Error from client-core (config, storage, state, transport)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for ConsoleError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        ConsoleError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for ConsoleError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ConsoleError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<StorageError> for ConsoleError {
    #[track_caller]
    fn from(error: StorageError) -> Self {
        ConsoleError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<StateError> for ConsoleError {
    #[track_caller]
    fn from(error: StateError) -> Self {
        ConsoleError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
