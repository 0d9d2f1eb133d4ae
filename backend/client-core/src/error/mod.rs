pub mod api;
pub mod config;
pub mod router;
pub mod state;
pub mod storage;
pub mod transport;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Router(#[from] router::RouterError),

    #[error(transparent)]
    State(#[from] state::StateError),

    #[error(transparent)]
    Api(#[from] api::ApiError),
}
