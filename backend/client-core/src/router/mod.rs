//! Event router: turns inbound channel frames into state mutations and
//! effects.
//!
//! All channels feed one task, so events are handled strictly one at a time
//! in arrival order. Mutations from one event land in the store as a single
//! batch before the next event is looked at.

pub mod event;
pub mod route;

pub use event::ServerEvent;
pub use route::{Action, CLICK_CENTRING, NoSnapshot, SnapshotSource, route};

use crate::effects::EffectQueue;
use crate::monitor::ConnectionMonitor;
use crate::state::store::Store;
use crate::transport::{Channel, InboundFrame, TransportEvent};

use std::sync::Arc;

use log::{error, info, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct EventRouter {
    store: Store,
    monitor: ConnectionMonitor,
    effects: EffectQueue,
    snapshots: Arc<dyn SnapshotSource>,
}

impl EventRouter {
    pub fn new(
        store: Store,
        monitor: ConnectionMonitor,
        effects: EffectQueue,
        snapshots: Arc<dyn SnapshotSource>,
    ) -> Self {
        Self {
            store,
            monitor,
            effects,
            snapshots,
        }
    }

    pub fn spawn(self, inbound: mpsc::UnboundedReceiver<InboundFrame>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbound))
    }

    pub async fn run(self, mut inbound: mpsc::UnboundedReceiver<InboundFrame>) {
        info!("Event router started");

        while let Some(frame) = inbound.recv().await {
            self.handle(frame).await;
        }

        info!("Event router stopped");
    }

    /// Route one frame to completion.
    pub async fn handle(&self, frame: InboundFrame) {
        let InboundFrame { channel, event } = frame;

        match event {
            TransportEvent::Status(status) => match channel {
                Channel::Hardware => self.monitor.on_status(status).await,
                other => trace!("{other} is now {status:?}"),
            },
            TransportEvent::Event { name, args, ack } => {
                let event = match ServerEvent::parse(channel, &name, args) {
                    Ok(Some(event)) => event,
                    Ok(None) => {
                        trace!("No route for {name} on {channel}");
                        return;
                    }
                    Err(e) => {
                        warn!("Dropping {name} on {channel}: {e}");
                        return;
                    }
                };

                let snapshots = Arc::clone(&self.snapshots);
                let actions = self
                    .store
                    .read(move |state| route(event, ack, state, snapshots.as_ref()))
                    .await;

                let mut mutations = Vec::new();
                let mut effects = Vec::new();
                for action in actions {
                    match action {
                        Action::Mutation(mutation) => mutations.push(mutation),
                        Action::Effect(effect) => effects.push(effect),
                    }
                }

                if let Err(e) = self.store.dispatch(mutations).await {
                    error!("Failed to apply mutations for {name}: {e}");
                }

                for effect in effects {
                    self.effects.push(effect);
                }
            }
        }
    }
}
