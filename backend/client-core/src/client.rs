//! Entry points that wire the core together.

use crate::config::ClientConfig;
use crate::effects::{ApiClient, EffectQueue};
use crate::error::CoreError;
use crate::monitor::ConnectionMonitor;
use crate::router::{EventRouter, SnapshotSource};
use crate::state::store::Store;
use crate::storage::Shared;
use crate::storage::remote::RemoteStore;
use crate::transport::{Channel, ChannelHandle, ChannelStatus, Multiplexer};

use models::ServerOrigin;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Owned connection to one instrument server.
///
/// Construct one per application and hand it to whatever owns the [`Store`].
pub struct SyncClient {
    origin: ServerOrigin,
    multiplexer: Multiplexer,
    grace: Duration,
    ack_timeout: Option<Duration>,
}

impl SyncClient {
    pub fn new(config: &ClientConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let origin = config.origin()?;
        let multiplexer = Multiplexer::new(&origin, config.reconnect_policy());

        Ok(Self {
            origin,
            multiplexer,
            grace: config.grace_interval(),
            ack_timeout: config.remote_ack_timeout(),
        })
    }

    pub fn origin(&self) -> &ServerOrigin {
        &self.origin
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    /// REST client for the same server.
    pub fn api_client(&self) -> Result<ApiClient, CoreError> {
        Ok(ApiClient::new(&self.origin.http_base())?)
    }

    /// Open the network channel; `on_status` sees every connected/disconnected
    /// transition.
    pub fn connect_network<F>(&self, on_status: F) -> ChannelHandle
    where
        F: Fn(bool) + Send + 'static,
    {
        let handle = self.multiplexer.channel(Channel::Network);
        let mut status = handle.subscribe_status();

        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let connected = *status.borrow_and_update() == ChannelStatus::Connected;
                debug!("Network channel connected: {connected}");
                on_status(connected);
            }
        });

        self.multiplexer.open(Channel::Network)
    }

    /// Open the ui-state channel and return the remote backend for the shared
    /// partition. Server pushes rehydrate `store` from then on.
    pub fn connect_state(&self, store: &Store) -> RemoteStore<Shared> {
        let handle = self.multiplexer.channel(Channel::UiState);
        let remote = RemoteStore::new(handle, store.control_token()).with_ack_timeout(self.ack_timeout);
        remote.listen_for_updates(store.clone());

        self.multiplexer.open(Channel::UiState);
        remote
    }

    /// Open the hardware and logging channels and route everything they
    /// deliver into `store`.
    ///
    /// Returns the router task; it ends once the multiplexer is dropped.
    pub fn listen(
        &self,
        store: &Store,
        effects: EffectQueue,
        snapshots: Arc<dyn SnapshotSource>,
    ) -> JoinHandle<()> {
        let (sink, inbound) = mpsc::unbounded_channel();

        for channel in [Channel::Hardware, Channel::Logging] {
            self.multiplexer.channel(channel).attach(sink.clone());
        }
        drop(sink);

        let monitor = ConnectionMonitor::new(store.clone(), self.grace);
        let router = EventRouter::new(store.clone(), monitor, effects, snapshots);
        let task = router.spawn(inbound);

        self.multiplexer.open(Channel::Hardware);
        self.multiplexer.open(Channel::Logging);
        info!("Listening for server events from {}", self.origin.http_base());

        task
    }

    pub async fn disconnect(&self) {
        self.multiplexer.disconnect().await;
    }
}
