use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("Storage Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Storage Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("Storage Serialization Error: {message} {location}")]
    Serialize {
        message: String,
        location: ErrorLocation,
    },

    #[error("Storage Key Error: {message} {location}")]
    Key {
        message: String,
        location: ErrorLocation,
    },

    #[error("Remote Storage Error: {source}")]
    Remote {
        #[from]
        source: TransportError,
    },
}

impl From<serde_json::Error> for StorageError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        StorageError::Serialize {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
