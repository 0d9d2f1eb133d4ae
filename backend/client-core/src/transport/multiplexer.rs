//! Shared-connection multiplexer.
//!
//! # Architecture
//!
//! One background task owns the WebSocket. It connects with exponential
//! backoff, answers engine pings, sends a namespace CONNECT for every opened
//! channel and fans inbound packets out to the channel registry:
//!
//! - an event with a registered handler goes to that handler
//! - any other event goes to the channel's attached sink (the event router)
//! - events on a channel with neither are dropped
//!
//! Outbound frames are queued to the task through an unbounded channel that
//! only exists while the engine is open. Sends on a channel that is not
//! connected are dropped, never buffered.

use crate::error::transport::TransportError;
use crate::transport::ack::{AckFuture, Acknowledger};
use crate::transport::channel::{Channel, ChannelStatus};
use crate::transport::packet::{EnginePacket, OpenHandshake, PacketType, SocketPacket};

use common::ErrorLocation;
use models::ServerOrigin;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep as TokioSleep, sleep_until, timeout as TokioTimeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Outbound = mpsc::UnboundedSender<String>;

/// Callback for one event name on one channel.
///
/// Runs on the connection task; anything slow must be handed off.
pub type EventHandler = Arc<dyn Fn(Vec<Value>, Option<Acknowledger>) + Send + Sync>;

#[derive(Debug)]
pub enum TransportEvent {
    Status(ChannelStatus),
    Event {
        name: String,
        args: Vec<Value>,
        ack: Option<Acknowledger>,
    },
}

/// An inbound event or status transition, tagged with its channel.
#[derive(Debug)]
pub struct InboundFrame {
    pub channel: Channel,
    pub event: TransportEvent,
}

pub type InboundSink = mpsc::UnboundedSender<InboundFrame>;

/// Reconnection schedule handed to [`backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// `None` retries forever.
    pub max_elapsed: Option<Duration>,
}

impl ReconnectPolicy {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: self.max_elapsed,
            ..Default::default()
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            max_elapsed: None,
        }
    }
}

/// Operations a channel offers to its consumers.
///
/// Implemented by [`ChannelHandle`]; storage backends are written against
/// this trait so they can run over a recording double.
pub trait ChannelPort: Send + Sync + 'static {
    /// Fire-and-forget send.
    fn emit(&self, event: &str, args: Vec<Value>);

    /// Send and wait for the remote side's acknowledgement.
    fn request(&self, event: &str, args: Vec<Value>) -> AckFuture;

    /// Register the single handler for `event`, replacing any previous one.
    fn on(&self, event: &str, handler: EventHandler);
}

struct ChannelSlot {
    opened: bool,
    handlers: HashMap<String, EventHandler>,
    sink: Option<InboundSink>,
    status: watch::Sender<ChannelStatus>,
}

impl ChannelSlot {
    fn new() -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            opened: false,
            handlers: HashMap::new(),
            sink: None,
            status,
        }
    }
}

struct Registry {
    channels: HashMap<Channel, ChannelSlot>,
    /// Outbound queue of the live engine session, if any.
    writer: Option<Outbound>,
}

struct Shared {
    url: String,
    policy: ReconnectPolicy,
    registry: Mutex<Registry>,
    pending_acks: Mutex<HashMap<(Channel, u64), oneshot::Sender<Vec<Value>>>>,
    next_ack_id: AtomicU64,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<(Channel, u64), oneshot::Sender<Vec<Value>>>> {
        self.pending_acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a status transition; forwards it to the channel sink only when it changed
    /// and the multiplexer is not shutting down.
    fn set_status(&self, channel: Channel, status: ChannelStatus) {
        let registry = self.registry();
        let Some(slot) = registry.channels.get(&channel) else {
            return;
        };

        let changed = slot.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if changed {
            info!("Channel {channel} {status:?}");

            // A deliberate close is not a connection loss for the router
            if *self.shutdown.borrow() {
                debug!("Shutting down, {channel} transition not forwarded");
                return;
            }

            if let Some(sink) = &slot.sink {
                let frame = InboundFrame {
                    channel,
                    event: TransportEvent::Status(status),
                };
                if sink.send(frame).is_err() {
                    debug!("Sink for {channel} closed, status transition not forwarded");
                }
            }
        }
    }

    fn mark_all_disconnected(&self) {
        for channel in Channel::ALL {
            self.set_status(channel, ChannelStatus::Disconnected);
        }
    }

    /// Queue a frame on the live session if `channel` is connected.
    fn send_frame(&self, channel: Channel, frame: String) -> bool {
        let registry = self.registry();
        let connected = registry
            .channels
            .get(&channel)
            .is_some_and(|slot| *slot.status.borrow() == ChannelStatus::Connected);

        if !connected {
            debug!("Channel {channel} not connected, dropping frame {frame}");
            return false;
        }

        match &registry.writer {
            Some(writer) => writer.send(frame).is_ok(),
            None => {
                debug!("No live connection, dropping frame {frame}");
                false
            }
        }
    }

    fn deliver(&self, channel: Channel, name: String, args: Vec<Value>, ack: Option<Acknowledger>) {
        let registry = self.registry();
        let Some(slot) = registry.channels.get(&channel) else {
            return;
        };

        if let Some(handler) = slot.handlers.get(&name) {
            let handler = Arc::clone(handler);
            drop(registry);
            trace!("Dispatching {channel} '{name}' to registered handler");
            handler(args, ack);
            return;
        }

        match &slot.sink {
            Some(sink) => {
                let frame = InboundFrame {
                    channel,
                    event: TransportEvent::Event { name, args, ack },
                };
                if sink.send(frame).is_err() {
                    debug!("Sink for {channel} closed, event dropped");
                }
            }
            None => trace!("No handler for {channel} '{name}', dropped"),
        }
    }

    fn resolve_ack(&self, channel: Channel, id: u64, args: Vec<Value>) {
        match self.pending().remove(&(channel, id)) {
            Some(responder) => {
                if responder.send(args).is_err() {
                    debug!("Requester for {channel} ack {id} went away");
                }
            }
            None => debug!("Unexpected ack {id} on {channel}"),
        }
    }
}

/// Owner of the shared realtime connection.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct Multiplexer {
    shared: Arc<Shared>,
}

impl Multiplexer {
    pub fn new(origin: &ServerOrigin, policy: ReconnectPolicy) -> Self {
        let channels = Channel::ALL
            .into_iter()
            .map(|channel| (channel, ChannelSlot::new()))
            .collect();
        let (shutdown, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                url: origin.socket_url(),
                policy,
                registry: Mutex::new(Registry {
                    channels,
                    writer: None,
                }),
                pending_acks: Mutex::new(HashMap::new()),
                next_ack_id: AtomicU64::new(0),
                running: AtomicBool::new(false),
                shutdown,
                task: Mutex::new(None),
            }),
        }
    }

    /// Handle to `channel` without opening it.
    pub fn channel(&self, channel: Channel) -> ChannelHandle {
        ChannelHandle {
            channel,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open `channel`, starting the shared connection on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, channel: Channel) -> ChannelHandle {
        {
            let mut registry = self.shared.registry();
            let writer = registry.writer.clone();
            if let Some(slot) = registry.channels.get_mut(&channel) {
                if !slot.opened {
                    slot.opened = true;
                    if let Some(writer) = writer {
                        let _ = writer.send(SocketPacket::connect(channel.namespace()).into_frame());
                    }
                }
            }
        }

        self.ensure_running();
        self.channel(channel)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Leave every namespace, close the socket and stop reconnecting.
    pub async fn disconnect(&self) {
        {
            let mut registry = self.shared.registry();
            let writer = registry.writer.clone();
            for (channel, slot) in registry.channels.iter_mut() {
                if slot.opened {
                    slot.opened = false;
                    if let Some(writer) = &writer {
                        let _ = writer.send(SocketPacket::disconnect(channel.namespace()).into_frame());
                    }
                }
            }
        }

        self.shared.shutdown.send_replace(true);

        let task = self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Connection task ended abnormally: {e}");
            }
        }

        self.shared.mark_all_disconnected();
        info!("Multiplexer disconnected from {}", self.shared.url);
    }

    fn ensure_running(&self) {
        if *self.shared.shutdown.borrow() {
            warn!("Multiplexer already shut down, not reconnecting");
            return;
        }

        if !self.shared.running.swap(true, Ordering::SeqCst) {
            let task = TokioSpawn(connection_loop(Arc::clone(&self.shared)));
            *self
                .shared
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(task);
            info!("Multiplexer connection task spawned for {}", self.shared.url);
        }
    }
}

/// One logical channel of a [`Multiplexer`].
#[derive(Clone)]
pub struct ChannelHandle {
    channel: Channel,
    shared: Arc<Shared>,
}

impl ChannelHandle {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn emit(&self, event: &str, args: Vec<Value>) {
        let frame = SocketPacket::event(self.channel.namespace(), event, args, None).into_frame();
        self.shared.send_frame(self.channel, frame);
    }

    /// Send `event` with a fresh ack id and return the pending response.
    pub fn request(&self, event: &str, args: Vec<Value>) -> AckFuture {
        let id = self.shared.next_ack_id.fetch_add(1, Ordering::SeqCst);
        let (responder, receiver) = oneshot::channel();
        let frame =
            SocketPacket::event(self.channel.namespace(), event, args, Some(id)).into_frame();

        self.shared.pending().insert((self.channel, id), responder);
        if !self.shared.send_frame(self.channel, frame) {
            // Dropping the responder fails the future instead of leaving it hanging.
            self.shared.pending().remove(&(self.channel, id));
        }

        AckFuture::new(event, receiver)
    }

    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(Vec<Value>, Option<Acknowledger>) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(handler));
    }

    /// Route every event without a registered handler (and every status
    /// transition) of this channel into `sink`.
    pub fn attach(&self, sink: InboundSink) {
        let mut registry = self.shared.registry();
        if let Some(slot) = registry.channels.get_mut(&self.channel) {
            if slot.sink.replace(sink).is_some() {
                warn!("Replacing inbound sink of {}", self.channel);
            }
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared
            .registry()
            .channels
            .get(&self.channel)
            .map(|slot| *slot.status.borrow())
            .unwrap_or(ChannelStatus::Disconnected)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        let registry = self.shared.registry();
        match registry.channels.get(&self.channel) {
            Some(slot) => slot.status.subscribe(),
            None => watch::channel(ChannelStatus::Disconnected).1,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    fn register(&self, event: &str, handler: EventHandler) {
        let mut registry = self.shared.registry();
        if let Some(slot) = registry.channels.get_mut(&self.channel) {
            if slot.handlers.insert(event.to_string(), handler).is_some() {
                warn!(
                    "Replacing handler for '{event}' on {}; one handler per event",
                    self.channel
                );
            }
        }
    }
}

impl ChannelPort for ChannelHandle {
    fn emit(&self, event: &str, args: Vec<Value>) {
        ChannelHandle::emit(self, event, args)
    }

    fn request(&self, event: &str, args: Vec<Value>) -> AckFuture {
        ChannelHandle::request(self, event, args)
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.register(event, handler)
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

async fn connection_loop(shared: Arc<Shared>) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut backoff = shared.policy.backoff();

    info!("Connection task started for {}", shared.url);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        match open_engine(&shared.url).await {
            Ok((socket, handshake)) => {
                backoff.reset();
                info!(
                    "Engine open (sid {}, ping every {}ms)",
                    handshake.sid, handshake.ping_interval
                );

                let end = run_session(&shared, socket, &handshake, &mut shutdown).await;
                shared.registry().writer = None;
                shared.mark_all_disconnected();

                match end {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost(reason) => warn!("Connection lost: {reason}"),
                }
            }
            Err(e) => warn!("Connection attempt to {} failed: {e}", shared.url),
        }

        let Some(delay) = backoff.next_backoff() else {
            error!("Giving up reconnecting to {}", shared.url);
            break;
        };

        debug!("Reconnecting in {delay:?}");
        tokio::select! {
            _ = TokioSleep(delay) => {}
            _ = shutdown.changed() => {}
        }
    }

    shared.registry().writer = None;
    shared.mark_all_disconnected();
    shared.running.store(false, Ordering::SeqCst);
    info!("Connection task stopped for {}", shared.url);
}

async fn open_engine(url: &str) -> Result<(Socket, OpenHandshake), TransportError> {
    let (mut socket, _) = connect_async(url).await.map_err(|e| TransportError::Connect {
        message: format!("WebSocket connect to {url} failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let first = TokioTimeout(HANDSHAKE_TIMEOUT, socket.next())
        .await
        .map_err(|_| TransportError::Handshake {
            message: format!("No open packet within {HANDSHAKE_TIMEOUT:?}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    match first {
        Some(Ok(Message::Text(text))) => match EnginePacket::decode(text.as_str())? {
            EnginePacket::Open(handshake) => Ok((socket, handshake)),
            other => Err(TransportError::Handshake {
                message: format!("Expected open packet, got {other:?}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        },
        Some(Ok(other)) => Err(TransportError::Handshake {
            message: format!("Expected text open packet, got {other:?}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        Some(Err(e)) => Err(TransportError::from(e)),
        None => Err(TransportError::Handshake {
            message: "Socket closed before open packet".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn run_session(
    shared: &Arc<Shared>,
    socket: Socket,
    handshake: &OpenHandshake,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let (writer, mut outbound) = mpsc::unbounded_channel::<String>();

    {
        let mut registry = shared.registry();
        for (channel, slot) in &registry.channels {
            if slot.opened {
                let _ = writer.send(SocketPacket::connect(channel.namespace()).into_frame());
            }
        }
        registry.writer = Some(writer.clone());
    }

    let ping_window = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + ping_window;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                flush_and_close(&mut sink, &mut outbound).await;
                return SessionEnd::Shutdown;
            }

            Some(frame) = outbound.recv() => {
                trace!("-> {frame}");
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    return SessionEnd::Lost(format!("write failed: {e}"));
                }
            }

            incoming = stream.next() => {
                if let Some(end) = handle_incoming(shared, &writer, incoming, &mut deadline, ping_window) {
                    return end;
                }
            }

            _ = sleep_until(deadline) => {
                return SessionEnd::Lost(format!("no ping within {ping_window:?}"));
            }
        }
    }
}

async fn flush_and_close(
    sink: &mut SplitSink<Socket, Message>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) {
    while let Ok(frame) = outbound.try_recv() {
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            debug!("Failed to flush frame during shutdown: {e}");
            return;
        }
    }

    let _ = sink.send(Message::Text(EnginePacket::Close.encode().into())).await;
    let _ = sink.close().await;
}

fn handle_incoming(
    shared: &Arc<Shared>,
    writer: &Outbound,
    incoming: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    deadline: &mut Instant,
    ping_window: Duration,
) -> Option<SessionEnd> {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            trace!("<- {}", text.as_str());
            handle_engine_text(shared, writer, text.as_str(), deadline, ping_window)
        }
        Some(Ok(Message::Binary(data))) => {
            warn!("Binary frame of {} bytes unsupported, dropped", data.len());
            None
        }
        Some(Ok(Message::Close(_))) | None => Some(SessionEnd::Lost("closed by server".to_string())),
        Some(Ok(_)) => None,
        Some(Err(e)) => Some(SessionEnd::Lost(format!("read failed: {e}"))),
    }
}

fn handle_engine_text(
    shared: &Arc<Shared>,
    writer: &Outbound,
    text: &str,
    deadline: &mut Instant,
    ping_window: Duration,
) -> Option<SessionEnd> {
    match EnginePacket::decode(text) {
        Ok(EnginePacket::Ping(data)) => {
            *deadline = Instant::now() + ping_window;
            let _ = writer.send(EnginePacket::Pong(data).encode());
            None
        }
        Ok(EnginePacket::Message(payload)) => {
            handle_socket_packet(shared, writer, &payload);
            None
        }
        Ok(EnginePacket::Close) => Some(SessionEnd::Lost("engine close packet".to_string())),
        Ok(EnginePacket::Open(_)) => {
            warn!("Unexpected open packet on live session, ignored");
            None
        }
        Ok(other) => {
            trace!("Ignoring engine packet {other:?}");
            None
        }
        Err(e) => {
            warn!("Dropping malformed engine frame: {e}");
            None
        }
    }
}

fn handle_socket_packet(shared: &Arc<Shared>, writer: &Outbound, payload: &str) {
    let packet = match SocketPacket::decode(payload) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping malformed socket packet: {e}");
            return;
        }
    };

    let Some(channel) = Channel::from_namespace(&packet.namespace) else {
        debug!("Packet for unknown namespace {} dropped", packet.namespace);
        return;
    };

    match packet.kind {
        PacketType::Connect => shared.set_status(channel, ChannelStatus::Connected),
        PacketType::Disconnect => shared.set_status(channel, ChannelStatus::Disconnected),
        PacketType::ConnectError => {
            warn!("Server refused {channel}: {:?}", packet.data);
            shared.set_status(channel, ChannelStatus::Disconnected);
        }
        PacketType::Event => {
            let ack = packet
                .ack_id
                .map(|id| acknowledger(writer.clone(), channel, id));
            match packet.event_parts() {
                Some((name, args)) => shared.deliver(channel, name, args, ack),
                None => warn!("Event on {channel} without a name, dropped"),
            }
        }
        PacketType::Ack => match packet.ack_id {
            Some(id) => shared.resolve_ack(channel, id, packet.ack_args()),
            None => warn!("Ack on {channel} without id, dropped"),
        },
        PacketType::BinaryEvent | PacketType::BinaryAck => {
            warn!("Binary packet on {channel} unsupported, dropped");
        }
    }
}

fn acknowledger(writer: Outbound, channel: Channel, id: u64) -> Acknowledger {
    Acknowledger::new(move |args| {
        let frame = SocketPacket::ack(channel.namespace(), id, args).into_frame();
        if writer.send(frame).is_err() {
            debug!("Connection closed before ack {id} on {channel} could be sent");
        }
    })
}
