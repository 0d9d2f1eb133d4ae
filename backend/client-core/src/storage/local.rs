//! Local backend: always available, never gated on control.

use crate::error::storage::StorageError;
use crate::storage::{KeyValueStore, Partition, StorageKey};

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

/// In-memory key-value map, optionally mirrored to a JSON file.
///
/// The mirror is rewritten through a temp file and rename after every change.
pub struct LocalStore<P: Partition> {
    entries: Mutex<BTreeMap<String, Value>>,
    file: Option<PathBuf>,
    partition: PhantomData<fn() -> P>,
}

impl<P: Partition> LocalStore<P> {
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            file: None,
            partition: PhantomData,
        }
    }

    /// Open a store mirrored to `path`, loading any entries already there.
    pub fn with_file(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| StorageError::Read {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                source: e,
            })?;
            let entries: BTreeMap<String, Value> = serde_json::from_str(&contents)?;
            info!(
                "Loaded {} {} entries from {}",
                entries.len(),
                P::NAME,
                path.display()
            );
            entries
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            entries: Mutex::new(entries),
            file: Some(path),
            partition: PhantomData,
        })
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mirror(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Write {
                location: ErrorLocation::from(Location::caller()),
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        std::fs::write(&temp_path, json).map_err(|e| StorageError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::Write {
                location: ErrorLocation::from(Location::caller()),
                path: path.clone(),
                source: e,
            });
        }

        debug!("Mirrored {} {} entries to {}", entries.len(), P::NAME, path.display());
        Ok(())
    }
}

#[async_trait]
impl<P: Partition> KeyValueStore<P> for LocalStore<P> {
    async fn set_item(&self, key: &StorageKey<P>, value: Value) -> Result<(), StorageError> {
        let mut entries = self.entries();
        let mut next = entries.clone();
        next.insert(key.full(), value);

        // Memory only moves once the mirror holds the same entries
        self.mirror(&next)?;
        *entries = next;
        Ok(())
    }

    async fn get_item(&self, key: &StorageKey<P>) -> Result<Option<Value>, StorageError> {
        Ok(self.entries().get(&key.full()).cloned())
    }

    async fn remove_item(&self, key: &StorageKey<P>) -> Result<(), StorageError> {
        let mut entries = self.entries();
        if !entries.contains_key(&key.full()) {
            return Ok(());
        }

        let mut next = entries.clone();
        next.remove(&key.full());
        self.mirror(&next)?;
        *entries = next;
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<StorageKey<P>>, StorageError> {
        Ok(self
            .entries()
            .keys()
            .filter_map(|full| StorageKey::from_full(full).ok())
            .collect())
    }
}
