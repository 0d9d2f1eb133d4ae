//! State store using the actor pattern.
//!
//! All writes to the tree go through one task:
//! - Mutation batches from the event router and effect runner
//! - Wholesale partition rehydration from persisted or pushed snapshots
//!
//! Reads take the read side of an `Arc<RwLock<AppState>>` and never queue
//! behind the actor. A batch is applied under a single write lock, so
//! readers see all of it or none of it.

use crate::error::state::StateError;
use crate::state::mutation::Mutation;
use crate::state::tree::AppState;
use crate::storage::{ControlToken, Partition, StatePersistor};

use common::ErrorLocation;

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot, watch};

type Rehydration = Box<dyn FnOnce(&mut AppState) + Send>;

/// Commands processed by the state actor.
pub enum StateCommand {
    /// Apply a batch of mutations atomically, then run persistors.
    Apply {
        mutations: Vec<Mutation>,
        done: oneshot::Sender<()>,
    },

    /// Overwrite a partition; persistors only re-baseline.
    Rehydrate {
        apply: Rehydration,
        done: oneshot::Sender<()>,
    },

    /// Start writing through a partition after every change to it.
    AttachPersistor(Arc<dyn StatePersistor>),
}

impl Debug for StateCommand {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            StateCommand::Apply { mutations, .. } => formatter
                .debug_struct("Apply")
                .field("mutations", mutations)
                .finish(),
            StateCommand::Rehydrate { .. } => formatter.write_str("Rehydrate"),
            StateCommand::AttachPersistor(persistor) => {
                write!(formatter, "AttachPersistor({})", persistor.name())
            }
        }
    }
}

/// Handle to the central state container.
///
/// This type is `Clone`; all clones share the same tree and actor.
#[derive(Clone)]
pub struct Store {
    /// Channel to send commands to the actor
    command_tx: Arc<Mutex<Option<mpsc::Sender<StateCommand>>>>,

    state: Arc<RwLock<AppState>>,

    actor_init: Arc<Mutex<bool>>,

    /// Bumped after every applied command that changed the tree
    revision: Arc<watch::Sender<u64>>,

    /// Mirrors `login.info.user.in_control`
    control: Arc<watch::Sender<bool>>,
}

impl Store {
    /// Create an empty store. The actor is spawned lazily on first write.
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(initial: AppState) -> Self {
        let (revision, _) = watch::channel(0);
        let (control, _) = watch::channel(initial.in_control());

        Self {
            command_tx: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(initial)),
            actor_init: Arc::new(Mutex::new(false)),
            revision: Arc::new(revision),
            control: Arc::new(control),
        }
    }

    /// Apply `mutations` as one batch and wait until readers can see them.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ActorStopped`] if the state actor has died.
    pub async fn dispatch(&self, mutations: Vec<Mutation>) -> Result<(), StateError> {
        if mutations.is_empty() {
            return Ok(());
        }

        let (done, applied) = oneshot::channel();
        self.send(StateCommand::Apply { mutations, done }).await?;
        applied.await.map_err(|_| StateError::ActorStopped {
            message: "State actor dropped a mutation batch".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Replace partition `P` with `slice`. Last writer wins; nothing is merged.
    pub async fn rehydrate<P: Partition>(&self, slice: P::Slice) -> Result<(), StateError> {
        let (done, applied) = oneshot::channel();
        let apply: Rehydration = Box::new(move |state| P::replace(state, slice));

        self.send(StateCommand::Rehydrate { apply, done }).await?;
        applied.await.map_err(|_| StateError::ActorStopped {
            message: format!("State actor dropped a rehydration of {}", P::NAME),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn attach_persistor(
        &self,
        persistor: Arc<dyn StatePersistor>,
    ) -> Result<(), StateError> {
        self.send(StateCommand::AttachPersistor(persistor)).await
    }

    /// Clone of the whole tree.
    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }

    /// Run `reader` against the current tree without cloning it.
    pub async fn read<R>(&self, reader: impl FnOnce(&AppState) -> R) -> R {
        let state = self.state.read().await;
        reader(&state)
    }

    pub fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn control_token(&self) -> ControlToken {
        ControlToken::new(self.control.subscribe())
    }

    async fn send(&self, command: StateCommand) -> Result<(), StateError> {
        self.ensure_actor().await;

        let tx_guard = self.command_tx.lock().await;
        let tx = tx_guard.as_ref().ok_or_else(|| StateError::ActorStopped {
            message: "State actor not initialized".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        tx.send(command).await.map_err(|e| StateError::ActorStopped {
            message: format!("State actor died: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(100);

            // Store tx BEFORE spawning to avoid race
            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(state_actor(
                rx,
                Arc::clone(&self.state),
                Arc::clone(&self.revision),
                Arc::clone(&self.control),
            ));
            *init_guard = true;
            info!("State actor spawned");
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// The state actor task.
///
/// Owns every write to the tree and processes commands strictly in order.
/// Runs until all [`Store`] handles are dropped.
async fn state_actor(
    mut command_rx: mpsc::Receiver<StateCommand>,
    state: Arc<RwLock<AppState>>,
    revision: Arc<watch::Sender<u64>>,
    control: Arc<watch::Sender<bool>>,
) {
    info!("State actor started");

    let mut persistors: Vec<Arc<dyn StatePersistor>> = Vec::new();

    while let Some(command) = command_rx.recv().await {
        match command {
            StateCommand::Apply { mutations, done } => {
                let mut tree = state.write().await;
                for mutation in &mutations {
                    tree.apply(mutation);
                }

                for persistor in &persistors {
                    if persistor.track(&tree) {
                        debug!("{} partition changed, persisting", persistor.name());
                        persistor.persist(&tree);
                    }
                }

                publish(&tree, &revision, &control);
                drop(tree);

                let _ = done.send(());
            }
            StateCommand::Rehydrate { apply, done } => {
                let mut tree = state.write().await;
                apply(&mut tree);

                for persistor in &persistors {
                    persistor.track(&tree);
                }

                publish(&tree, &revision, &control);
                drop(tree);

                let _ = done.send(());
            }
            StateCommand::AttachPersistor(persistor) => {
                persistor.track(&*state.read().await);
                info!("Persistor attached for {} partition", persistor.name());
                persistors.push(persistor);
            }
        }
    }

    warn!("State actor stopped");
}

fn publish(tree: &AppState, revision: &watch::Sender<u64>, control: &watch::Sender<bool>) {
    revision.send_modify(|current| *current += 1);

    let in_control = tree.in_control();
    control.send_if_modified(|current| {
        if *current == in_control {
            false
        } else {
            info!("Control token now {in_control}");
            *current = in_control;
            true
        }
    });
}
