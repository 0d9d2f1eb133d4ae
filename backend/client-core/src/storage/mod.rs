//! Key-value sync store: one interface, a local and a remote backend.
//!
//! The identity and shared partitions of [`AppState`] are persisted through
//! separate typed stores. A [`StorageKey`] carries its partition's prefix, so
//! a key of one partition can never be written through the other's store.

pub mod local;
pub mod persistor;
pub mod remote;

pub use local::LocalStore;
pub use persistor::{Persistor, StatePersistor};
pub use remote::RemoteStore;

use crate::error::storage::StorageError;
use crate::state::tree::{AppState, LoginState, SharedState};

use common::ErrorLocation;

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::marker::PhantomData;
use std::panic::Location;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

/// A persisted region of the state tree with its own key namespace.
pub trait Partition: Send + Sync + 'static {
    const NAME: &'static str;
    const PREFIX: &'static str;

    type Slice: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn slice(state: &AppState) -> &Self::Slice;

    /// Overwrite the partition wholesale; nothing of the old slice survives.
    fn replace(state: &mut AppState, slice: Self::Slice);
}

/// Session identity, persisted locally only.
#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl Partition for Identity {
    const NAME: &'static str = "identity";
    const PREFIX: &'static str = "persist:identity:";

    type Slice = LoginState;

    fn slice(state: &AppState) -> &LoginState {
        &state.login
    }

    fn replace(state: &mut AppState, slice: LoginState) {
        state.login = slice;
    }
}

/// Collaborative state, persisted on the server only.
#[derive(Debug, Clone, Copy)]
pub struct Shared;

impl Partition for Shared {
    const NAME: &'static str = "shared";
    const PREFIX: &'static str = "persist:shared:";

    type Slice = SharedState;

    fn slice(state: &AppState) -> &SharedState {
        &state.shared
    }

    fn replace(state: &mut AppState, slice: SharedState) {
        state.shared = slice;
    }
}

/// A key inside partition `P`'s namespace.
pub struct StorageKey<P: Partition> {
    name: String,
    partition: PhantomData<P>,
}

impl<P: Partition> StorageKey<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition: PhantomData,
        }
    }

    /// Parse a full wire key, rejecting keys of other partitions.
    #[track_caller]
    pub fn from_full(full: &str) -> Result<Self, StorageError> {
        full.strip_prefix(P::PREFIX)
            .map(Self::new)
            .ok_or_else(|| StorageError::Key {
                message: format!("Key '{full}' is outside the {} partition", P::NAME),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key as written to the backend, including the partition prefix.
    pub fn full(&self) -> String {
        format!("{}{}", P::PREFIX, self.name)
    }
}

impl<P: Partition> Clone for StorageKey<P> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<P: Partition> PartialEq for StorageKey<P> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<P: Partition> Eq for StorageKey<P> {}

impl<P: Partition> Debug for StorageKey<P> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "StorageKey({})", self.full())
    }
}

/// Get/set/remove/list over one partition's keys.
#[async_trait]
pub trait KeyValueStore<P: Partition>: Send + Sync {
    async fn set_item(&self, key: &StorageKey<P>, value: Value) -> Result<(), StorageError>;

    async fn get_item(&self, key: &StorageKey<P>) -> Result<Option<Value>, StorageError>;

    async fn remove_item(&self, key: &StorageKey<P>) -> Result<(), StorageError>;

    async fn get_all_keys(&self) -> Result<Vec<StorageKey<P>>, StorageError>;
}

/// Read-only view of "the local operator holds control".
///
/// Owned by the session state; storage only ever reads it.
#[derive(Debug, Clone)]
pub struct ControlToken(watch::Receiver<bool>);

impl ControlToken {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    /// A token that never changes.
    pub fn fixed(in_control: bool) -> Self {
        Self(watch::channel(in_control).1)
    }

    pub fn in_control(&self) -> bool {
        *self.0.borrow()
    }
}
