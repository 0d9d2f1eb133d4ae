//! Test helpers for integration tests.
//!
//! A loopback Socket.IO server good enough for the client:
//! - Sends the Engine.IO open packet on every new connection
//! - Answers every namespace CONNECT
//! - Records every text frame the client sends
//! - Pushes frames and drops connections on request

use client_core::config::ClientConfig;
use client_core::transport::packet::SocketPacket;
use client_core::transport::{ChannelHandle, ChannelStatus};

use models::{ServerOrigin, ServerOriginBuilder};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(5);

const OPEN_PACKET: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

enum ServerCommand {
    Frame(String),
    Drop,
    Shutdown,
}

pub struct FakeServer {
    pub origin: ServerOrigin,
    commands: mpsc::UnboundedSender<ServerCommand>,
    received: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl FakeServer {
    /// Listen on an ephemeral port; connections are served one at a time.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind loopback listener");
        let port = listener.local_addr().expect("local addr").port();

        let (commands, mut pending) = mpsc::unbounded_channel::<ServerCommand>();
        let (seen, received) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };
                if ws.send(Message::Text(OPEN_PACKET.into())).await.is_err() {
                    continue;
                }

                loop {
                    tokio::select! {
                        frame = ws.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                let text = text.as_str().to_string();
                                if let Some(namespace) = text
                                    .strip_prefix("40")
                                    .and_then(|rest| rest.strip_suffix(','))
                                {
                                    let reply = format!(r#"40{namespace},{{"sid":"{namespace}-sid"}}"#);
                                    let _ = ws.send(Message::Text(reply.into())).await;
                                }
                                let _ = seen.send(text);
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                        command = pending.recv() => match command {
                            Some(ServerCommand::Frame(text)) => {
                                let _ = ws.send(Message::Text(text.into())).await;
                            }
                            Some(ServerCommand::Drop) => {
                                let _ = ws.close(None).await;
                                break;
                            }
                            Some(ServerCommand::Shutdown) => {
                                let _ = ws.close(None).await;
                                return;
                            }
                            None => return,
                        },
                    }
                }
            }
        });

        let origin = ServerOriginBuilder::default()
            .with_host("127.0.0.1")
            .with_port(port)
            .build()
            .expect("valid origin");

        Self {
            origin,
            commands,
            received: Mutex::new(received),
        }
    }

    /// Client config pointing at this server with fast reconnects.
    pub fn config(&self, grace: Duration) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.origin = self.origin.http_base();
        config.connection.grace_interval_ms = grace.as_millis() as u64;
        config.connection.reconnect_initial_ms = 20;
        config.connection.reconnect_max_ms = 100;
        config
    }

    pub fn push(&self, namespace: &str, event: &str, args: Vec<Value>) {
        self.push_with_ack(namespace, event, args, None);
    }

    pub fn push_with_ack(&self, namespace: &str, event: &str, args: Vec<Value>, ack_id: Option<u64>) {
        let frame = SocketPacket::event(namespace, event, args, ack_id).into_frame();
        self.send_raw(frame);
    }

    /// Answer a client request.
    pub fn ack(&self, namespace: &str, ack_id: u64, args: Vec<Value>) {
        self.send_raw(SocketPacket::ack(namespace, ack_id, args).into_frame());
    }

    pub fn send_raw(&self, frame: String) {
        let _ = self.commands.send(ServerCommand::Frame(frame));
    }

    /// Close the current connection; the next one is accepted as usual.
    pub fn drop_connection(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    /// Close the connection and stop listening; reconnects are refused from then on.
    pub fn shutdown(&self) {
        let _ = self.commands.send(ServerCommand::Shutdown);
    }

    /// Wait for the next client frame matching `predicate`, skipping others.
    pub async fn expect_frame(&self, predicate: impl Fn(&str) -> bool) -> String {
        let mut received = self.received.lock().await;
        timeout(WAIT, async {
            loop {
                let frame = received.recv().await.expect("server task stopped");
                if predicate(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("Timed out waiting for client frame")
    }

    /// Wait for the client's next EVENT on `namespace` and decode it.
    pub async fn expect_event(&self, namespace: &str) -> SocketPacket {
        let prefix = format!("42{namespace},");
        let frame = self.expect_frame(|frame| frame.starts_with(&prefix)).await;
        SocketPacket::decode(&frame[1..]).expect("client frame should decode")
    }
}

pub async fn wait_for_status(handle: &ChannelHandle, wanted: ChannelStatus) {
    let mut status = handle.subscribe_status();
    timeout(WAIT, status.wait_for(|current| *current == wanted))
        .await
        .expect("Timed out waiting for channel status")
        .expect("status sender dropped");
}

/// Poll `check` until it holds or the wait budget is spent.
pub async fn eventually<F>(mut check: F)
where
    F: AsyncFnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition not met within {WAIT:?}");
}
