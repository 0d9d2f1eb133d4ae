//! Write-through persistence of one state partition.

use crate::error::CoreError;
use crate::error::storage::StorageError;
use crate::state::store::Store;
use crate::state::tree::AppState;
use crate::storage::{KeyValueStore, Partition, StorageKey};

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;

/// Key the partition is stored under.
pub const ROOT_KEY: &str = "root";

/// Hook the store calls after every state change.
pub trait StatePersistor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Remember the partition as it is in `state`. Returns true when it
    /// differs from what was remembered before.
    fn track(&self, state: &AppState) -> bool;

    /// Queue a write of the partition as it is in `state`.
    fn persist(&self, state: &AppState);
}

/// Persists partition `P` under [`ROOT_KEY`] of backend `S`.
///
/// Writes are queued to a dedicated task so they reach the backend in the
/// order the state changed.
pub struct Persistor<P: Partition, S: KeyValueStore<P> + 'static> {
    backend: Arc<S>,
    key: StorageKey<P>,
    last: Mutex<Option<P::Slice>>,
    writes: mpsc::UnboundedSender<Value>,
}

impl<P: Partition, S: KeyValueStore<P> + 'static> Persistor<P, S> {
    /// Create the persistor and its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Arc<S>) -> Arc<Self> {
        let key = StorageKey::<P>::new(ROOT_KEY);
        let (writes, mut queued) = mpsc::unbounded_channel::<Value>();

        let writer_backend = Arc::clone(&backend);
        let writer_key = key.clone();
        TokioSpawn(async move {
            while let Some(value) = queued.recv().await {
                match writer_backend.set_item(&writer_key, value).await {
                    Ok(()) => debug!("Persisted {} partition", P::NAME),
                    Err(e) => error!("Failed to persist {} partition: {e}", P::NAME),
                }
            }
        });

        Arc::new(Self {
            backend,
            key,
            last: Mutex::new(None),
            writes,
        })
    }

    pub fn key(&self) -> &StorageKey<P> {
        &self.key
    }

    pub fn backend(&self) -> &Arc<S> {
        &self.backend
    }

    /// Load the stored partition and rehydrate `store` with it.
    ///
    /// Returns false when nothing was stored.
    pub async fn restore(&self, store: &Store) -> Result<bool, CoreError> {
        let Some(value) = self.backend.get_item(&self.key).await? else {
            info!("No stored {} partition to restore", P::NAME);
            return Ok(false);
        };

        let slice: P::Slice = serde_json::from_value(value).map_err(StorageError::from)?;
        store.rehydrate::<P>(slice).await?;
        info!("Restored {} partition", P::NAME);
        Ok(true)
    }

    /// Write the current partition immediately.
    pub async fn flush(&self, store: &Store) -> Result<(), StorageError> {
        let slice = store.read(|state| P::slice(state).clone()).await;
        self.backend
            .set_item(&self.key, serde_json::to_value(&slice)?)
            .await
    }
}

impl<P: Partition, S: KeyValueStore<P> + 'static> StatePersistor for Persistor<P, S> {
    fn name(&self) -> &'static str {
        P::NAME
    }

    fn track(&self, state: &AppState) -> bool {
        let current = P::slice(state);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if last.as_ref() == Some(current) {
            return false;
        }

        *last = Some(current.clone());
        true
    }

    fn persist(&self, state: &AppState) {
        match serde_json::to_value(P::slice(state)) {
            Ok(value) => {
                if self.writes.send(value).is_err() {
                    error!("Writer for {} partition stopped", P::NAME);
                }
            }
            Err(e) => error!("Failed to serialize {} partition: {e}", P::NAME),
        }
    }
}
