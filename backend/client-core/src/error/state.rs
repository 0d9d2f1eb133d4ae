use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StateError {
    #[error("State Actor Stopped: {message} {location}")]
    ActorStopped {
        message: String,
        location: ErrorLocation,
    },
}
