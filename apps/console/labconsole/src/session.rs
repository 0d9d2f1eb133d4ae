//! One running connection to an instrument server and the state it feeds.

use crate::error::ConsoleError;
use crate::view::ViewSummary;

use client_core::SyncClient;
use client_core::config::ClientConfig;
use client_core::effects::{EffectQueue, EffectRunner, LogChatSink, ServerEffects};
use client_core::router::NoSnapshot;
use client_core::state::Store;
use client_core::storage::remote::RemoteStore;
use client_core::storage::{Identity, LocalStore, Persistor, Shared};
use client_core::transport::ChannelStatus;

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type IdentityPersistor = Persistor<Identity, LocalStore<Identity>>;

pub struct Session {
    client: SyncClient,
    store: Store,
    identity: Arc<IdentityPersistor>,
    network: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Restore the identity partition, then open every channel.
    ///
    /// The shared partition is restored from the server once the state channel
    /// first connects, and only then written back on change.
    pub async fn start(config: &ClientConfig) -> Result<Self, ConsoleError> {
        let client = SyncClient::new(config)?;
        let store = Store::new();

        let local = match &config.storage.local_state_file {
            Some(path) => LocalStore::with_file(path)?,
            None => LocalStore::in_memory(),
        };
        let identity = Persistor::<Identity, _>::new(Arc::new(local));
        identity.restore(&store).await?;
        store.attach_persistor(identity.clone()).await?;

        let (network_tx, network) = watch::channel(false);
        client.connect_network(move |connected| {
            network_tx.send_replace(connected);
        });

        let remote = client.connect_state(&store);
        let restore = tokio::spawn(restore_shared(remote, store.clone()));

        let (effects, queue) = EffectQueue::channel();
        let handler = Arc::new(ServerEffects::new(
            client.api_client()?,
            Arc::new(LogChatSink),
        ));
        let runner = EffectRunner::new(handler, store.clone()).spawn(queue);
        let router = client.listen(&store, effects, Arc::new(NoSnapshot));

        info!("Session started against {}", client.origin().http_base());

        Ok(Self {
            client,
            store,
            identity,
            network,
            tasks: vec![restore, runner, router],
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn subscribe_network(&self) -> watch::Receiver<bool> {
        self.network.clone()
    }

    pub async fn summary(&self) -> ViewSummary {
        let network_connected = *self.network.borrow();
        self.store
            .read(|state| ViewSummary::from_state(state, network_connected))
            .await
    }

    /// Flush the identity partition and close every channel.
    pub async fn shutdown(self) {
        if let Err(e) = self.identity.flush(&self.store).await {
            warn!("Failed to flush identity on shutdown: {e}");
        }

        self.client.disconnect().await;
        for task in self.tasks {
            task.abort();
        }

        info!("Session closed");
    }
}

async fn restore_shared(remote: RemoteStore<Shared>, store: Store) {
    let mut status = remote.channel().subscribe_status();
    if status
        .wait_for(|current| *current == ChannelStatus::Connected)
        .await
        .is_err()
    {
        return;
    }

    let shared = Persistor::<Shared, _>::new(Arc::new(remote));
    match shared.restore(&store).await {
        Ok(true) => {}
        Ok(false) => info!("Server holds no shared state yet"),
        Err(e) => warn!("Shared state not restored: {e}"),
    }

    if let Err(e) = store.attach_persistor(shared).await {
        warn!("Shared state will not be written back: {e}");
    }
}
