use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RouterError {
    #[error("Payload Error: {event}: {message} {location}")]
    Payload {
        event: String,
        message: String,
        location: ErrorLocation,
    },
}
