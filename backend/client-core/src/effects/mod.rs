//! Side effects requested by routed events.
//!
//! Effects run on their own task in FIFO order so slow HTTP calls never hold
//! up event routing. Whatever state they learn flows back into the store as
//! ordinary mutations.

pub mod api_client;

pub use api_client::ApiClient;

use crate::state::mutation::Mutation;
use crate::state::store::Store;
use crate::state::tree::AbortAction;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchRemoteAccess,
    FetchLoginInfo,
    SignOut,
    StopQueue,
    RefreshScContents,
    /// Markdown text for the transient chat widget.
    ShowChatMessage(String),
}

impl From<AbortAction> for Effect {
    fn from(action: AbortAction) -> Self {
        match action {
            AbortAction::StopQueue => Effect::StopQueue,
        }
    }
}

#[async_trait]
pub trait EffectHandler: Send + Sync {
    /// Perform `effect` and return the mutations describing what it learned.
    async fn handle(&self, effect: &Effect) -> Vec<Mutation>;
}

/// Where chat lines end up.
pub trait ChatSink: Send + Sync {
    fn show(&self, message: &str);
}

/// Writes chat lines to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChatSink;

impl ChatSink for LogChatSink {
    fn show(&self, message: &str) {
        info!("[chat] {message}");
    }
}

/// Sender half of the effect queue; cheap to clone.
#[derive(Debug, Clone)]
pub struct EffectQueue {
    tx: mpsc::UnboundedSender<Effect>,
}

impl EffectQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Effect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, effect: Effect) {
        debug!("Queueing effect {effect:?}");
        if self.tx.send(effect).is_err() {
            warn!("Effect runner stopped, effect dropped");
        }
    }
}

/// Drains the effect queue one effect at a time.
pub struct EffectRunner {
    handler: Arc<dyn EffectHandler>,
    store: Store,
}

impl EffectRunner {
    pub fn new(handler: Arc<dyn EffectHandler>, store: Store) -> Self {
        Self { handler, store }
    }

    pub fn spawn(self, effects: mpsc::UnboundedReceiver<Effect>) -> JoinHandle<()> {
        tokio::spawn(self.run(effects))
    }

    pub async fn run(self, mut effects: mpsc::UnboundedReceiver<Effect>) {
        info!("Effect runner started");

        while let Some(effect) = effects.recv().await {
            let mutations = self.handler.handle(&effect).await;
            if let Err(e) = self.store.dispatch(mutations).await {
                error!("Failed to apply result of {effect:?}: {e}");
            }
        }

        info!("Effect runner stopped");
    }
}

/// Default handler: REST calls against the instrument server plus a chat sink.
pub struct ServerEffects {
    api: ApiClient,
    chat: Arc<dyn ChatSink>,
}

impl ServerEffects {
    pub fn new(api: ApiClient, chat: Arc<dyn ChatSink>) -> Self {
        Self { api, chat }
    }
}

#[async_trait]
impl EffectHandler for ServerEffects {
    async fn handle(&self, effect: &Effect) -> Vec<Mutation> {
        let outcome = match effect {
            Effect::FetchRemoteAccess => self
                .api
                .remote_access()
                .await
                .map(|data| vec![Mutation::SetRemoteAccess(data)]),
            Effect::FetchLoginInfo => self
                .api
                .login_info()
                .await
                .map(|info| vec![Mutation::SetLoginInfo(info)]),
            Effect::SignOut => self
                .api
                .sign_out()
                .await
                .map(|()| vec![Mutation::SignedOut]),
            Effect::StopQueue => self.api.stop_queue().await.map(|()| Vec::new()),
            Effect::RefreshScContents => self
                .api
                .sample_changer_contents()
                .await
                .map(|contents| vec![Mutation::SetScContents(contents)]),
            Effect::ShowChatMessage(message) => {
                self.chat.show(message);
                Ok(Vec::new())
            }
        };

        outcome.unwrap_or_else(|e| {
            warn!("{effect:?} failed: {e}");
            Vec::new()
        })
    }
}
