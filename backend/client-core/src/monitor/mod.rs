//! Debounced liveness tracking for the hardware-events channel.
//!
//! A disconnect only surfaces as "connection lost" after the channel has
//! stayed down for the whole grace interval. A reconnect clears the
//! indicator at once.

use crate::state::mutation::Mutation;
use crate::state::store::Store;
use crate::transport::ChannelStatus;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connect seen yet; nothing is reported.
    Unknown,
    Connected,
    /// Disconnected, grace timer running.
    PendingLost,
    Lost,
}

#[derive(Debug)]
struct MonitorInner {
    state: LinkState,
    /// Bumped on every transition; a grace timer is stale once it moves on.
    epoch: u64,
}

/// Connection monitor for one channel.
///
/// This type is `Clone`; all clones share the same state machine.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<Mutex<MonitorInner>>,
    store: Store,
    grace: Duration,
}

impl ConnectionMonitor {
    pub fn new(store: Store, grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                state: LinkState::Unknown,
                epoch: 0,
            })),
            store,
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub async fn state(&self) -> LinkState {
        self.inner.lock().await.state
    }

    pub async fn on_status(&self, status: ChannelStatus) {
        match status {
            ChannelStatus::Connected => self.on_connect().await,
            ChannelStatus::Disconnected => self.on_disconnect().await,
        }
    }

    pub async fn on_connect(&self) {
        let mut inner = self.inner.lock().await;
        let previous = inner.state;
        inner.state = LinkState::Connected;
        inner.epoch += 1;

        if previous != LinkState::Connected {
            info!("Hardware channel connected (was {previous:?})");
        }

        // Dispatched under the lock so a racing grace timer observes the new epoch first
        if let Err(e) = self
            .store
            .dispatch(vec![Mutation::ShowConnectionLostDialog(false)])
            .await
        {
            error!("Failed to clear connection-lost indicator: {e}");
        }
    }

    pub async fn on_disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != LinkState::Connected {
            trace!("Disconnect ignored in state {:?}", inner.state);
            return;
        }

        inner.state = LinkState::PendingLost;
        inner.epoch += 1;
        let epoch = inner.epoch;
        drop(inner);

        info!(
            "Hardware channel disconnected, waiting {} ms before reporting",
            self.grace.as_millis()
        );

        let monitor = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(monitor.grace).await;
            monitor.grace_elapsed(epoch).await;
        });
    }

    async fn grace_elapsed(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || inner.state != LinkState::PendingLost {
            debug!("Stale grace check (epoch {epoch}, now {})", inner.epoch);
            return;
        }

        inner.state = LinkState::Lost;
        inner.epoch += 1;
        info!("Hardware channel still down after grace interval, connection lost");

        if let Err(e) = self
            .store
            .dispatch(vec![Mutation::ShowConnectionLostDialog(true)])
            .await
        {
            error!("Failed to raise connection-lost indicator: {e}");
        }
    }
}
