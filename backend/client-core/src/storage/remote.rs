//! Remote backend: server-authoritative storage over the ui-state channel.

use crate::error::storage::StorageError;
use crate::state::store::Store;
use crate::storage::{ControlToken, KeyValueStore, Partition, StorageKey};
use crate::transport::{AckFuture, Acknowledger, ChannelHandle, ChannelPort};

use common::ErrorLocation;

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;

pub const SET_EVENT: &str = "ui_state_set";
pub const GET_EVENT: &str = "ui_state_get";
pub const REMOVE_EVENT: &str = "ui_state_rm";
pub const KEYS_EVENT: &str = "ui_state_getkeys";
pub const STATE_UPDATE_EVENT: &str = "state_update";

/// Key-value store whose records live on the server.
///
/// Writes are admitted only while the [`ControlToken`] reads true; otherwise
/// they are dropped, not queued. Reads are always allowed.
pub struct RemoteStore<P: Partition, C: ChannelPort = ChannelHandle> {
    channel: Arc<C>,
    control: ControlToken,
    ack_timeout: Option<Duration>,
    partition: PhantomData<fn() -> P>,
}

impl<P: Partition, C: ChannelPort> RemoteStore<P, C> {
    pub fn new(channel: C, control: ControlToken) -> Self {
        Self {
            channel: Arc::new(channel),
            control,
            ack_timeout: None,
            partition: PhantomData,
        }
    }

    /// Fail round trips that are not acknowledged within `timeout`.
    /// `None` waits forever.
    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Rehydrate partition `P` of `store` from every `state_update` push.
    ///
    /// Pushes are applied in arrival order, each one a full overwrite.
    pub fn listen_for_updates(&self, store: Store) {
        let (updates, mut pending) = mpsc::unbounded_channel::<P::Slice>();

        self.channel.on(
            STATE_UPDATE_EVENT,
            Arc::new(move |args: Vec<Value>, _ack: Option<Acknowledger>| match parse_state_update::<P>(&args) {
                Ok(slice) => {
                    if updates.send(slice).is_err() {
                        debug!("State update listener stopped, push dropped");
                    }
                }
                Err(e) => warn!("Dropping malformed {STATE_UPDATE_EVENT}: {e}"),
            }),
        );

        TokioSpawn(async move {
            while let Some(slice) = pending.recv().await {
                if let Err(e) = store.rehydrate::<P>(slice).await {
                    error!("Failed to rehydrate {} partition: {e}", P::NAME);
                    break;
                }
                info!("Rehydrated {} partition from server push", P::NAME);
            }
        });
    }

    async fn acknowledged(&self, future: AckFuture) -> Result<Vec<Value>, StorageError> {
        let response = match self.ack_timeout {
            Some(timeout) => future.response_within(timeout).await?,
            None => future.response().await?,
        };
        Ok(response)
    }
}

#[async_trait]
impl<P: Partition, C: ChannelPort> KeyValueStore<P> for RemoteStore<P, C> {
    async fn set_item(&self, key: &StorageKey<P>, value: Value) -> Result<(), StorageError> {
        if !self.control.in_control() {
            debug!("Not in control, dropping write of {}", key.full());
            return Ok(());
        }

        self.channel.emit(
            SET_EVENT,
            vec![Value::Array(vec![Value::String(key.full()), value])],
        );
        Ok(())
    }

    async fn get_item(&self, key: &StorageKey<P>) -> Result<Option<Value>, StorageError> {
        let future = self
            .channel
            .request(GET_EVENT, vec![Value::String(key.full())]);
        let response = self.acknowledged(future).await?;

        Ok(response.into_iter().next().filter(|value| !value.is_null()))
    }

    async fn remove_item(&self, key: &StorageKey<P>) -> Result<(), StorageError> {
        self.channel
            .emit(REMOVE_EVENT, vec![Value::String(key.full())]);
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<StorageKey<P>>, StorageError> {
        let future = self.channel.request(KEYS_EVENT, vec![Value::Null]);
        let response = self.acknowledged(future).await?;

        let keys = match response.into_iter().next() {
            Some(Value::Array(keys)) => keys,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(StorageError::Serialize {
                    message: format!("Expected key list, got {other}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        Ok(keys
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|full| StorageKey::from_full(full).ok())
            .collect())
    }
}

/// Decode a `state_update` payload: a JSON document, either as a string or inline.
pub fn parse_state_update<P: Partition>(args: &[Value]) -> Result<P::Slice, StorageError> {
    match args.first() {
        Some(Value::String(text)) => Ok(serde_json::from_str(text)?),
        Some(value @ Value::Object(_)) => Ok(serde_json::from_value(value.clone())?),
        Some(other) => Err(StorageError::Serialize {
            message: format!("Unexpected {STATE_UPDATE_EVENT} payload: {other}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        None => Err(StorageError::Serialize {
            message: format!("Empty {STATE_UPDATE_EVENT} payload"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
