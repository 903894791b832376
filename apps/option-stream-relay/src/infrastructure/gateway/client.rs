//! Gateway WebSocket Client
//!
//! Delivers outbound events to the downstream gateway as JSON text frames
//! (`{"event": <name>, "data": <payload>}`).
//!
//! `emit` never blocks: frames go into a bounded queue drained by a single
//! writer task that owns the socket. The writer task also runs ping/pong
//! liveness and reconnects with exponential backoff. While the link is down
//! `emit` reports [`BroadcastError::NotConnected`] and frames still queued at
//! the moment of a disconnect are dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use crate::application::ports::{BroadcastError, BroadcastPort};
use crate::domain::streaming::{EventKind, OutboundEvent};
use crate::infrastructure::config::GatewaySettings;
use crate::infrastructure::metrics::{self, DropReason};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on waiting for the writer task during `disconnect`.
const WRITER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end one gateway connection.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Connection attempt failed.
    #[error("gateway connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// No pong within the timeout.
    #[error("heartbeat timeout")]
    HeartbeatTimeout,

    /// Peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket URL, `ws://` or `wss://`.
    pub url: String,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Time without a pong before the link is considered dead.
    pub pong_timeout: Duration,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    /// Create a configuration with default link parameters.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue_capacity: 10_000,
            reconnect: ReconnectConfig::default(),
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Build from gateway settings.
    #[must_use]
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            queue_capacity: settings.queue_capacity,
            reconnect: ReconnectConfig::from_gateway_settings(settings),
            ping_interval: settings.ping_interval,
            pong_timeout: settings.pong_timeout,
            ..Self::new(settings.url.clone())
        }
    }
}

// =============================================================================
// Link State
// =============================================================================

#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    reconnects: AtomicU64,
}

impl LinkState {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        metrics::set_gateway_connected(connected);
    }
}

/// Point-in-time gateway statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Link currently live.
    pub connected: bool,
    /// Frames written to the socket.
    pub frames_sent: u64,
    /// Queued frames lost to a disconnect.
    pub frames_dropped: u64,
    /// Reconnection attempts made.
    pub reconnects: u64,
}

struct Frame {
    kind: EventKind,
    text: String,
}

// =============================================================================
// Gateway Client
// =============================================================================

/// WebSocket [`BroadcastPort`] for the downstream gateway.
pub struct GatewayClient {
    config: GatewayConfig,
    queue_tx: mpsc::Sender<Frame>,
    queue_rx: Mutex<Option<mpsc::Receiver<Frame>>>,
    link: Arc<LinkState>,
    cancel: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl GatewayClient {
    /// Create a client. Nothing is dialed until `connect`.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            config,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            link: Arc::new(LinkState::default()),
            cancel: CancellationToken::new(),
            writer: Mutex::new(None),
        }
    }

    /// Gateway URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            connected: self.link.connected.load(Ordering::SeqCst),
            frames_sent: self.link.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.link.frames_dropped.load(Ordering::Relaxed),
            reconnects: self.link.reconnects.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl BroadcastPort for GatewayClient {
    async fn connect(&self) -> Result<(), BroadcastError> {
        self.config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BroadcastError::ConnectFailed(e.to_string()))?;

        let Some(queue_rx) = self.queue_rx.lock().take() else {
            return if self.cancel.is_cancelled() {
                Err(BroadcastError::Closed)
            } else {
                Ok(())
            };
        };

        let writer = Writer {
            config: self.config.clone(),
            link: Arc::clone(&self.link),
            cancel: self.cancel.clone(),
        };
        *self.writer.lock() = Some(tokio::spawn(writer.run(queue_rx)));
        Ok(())
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(WRITER_JOIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!(url = %self.config.url, "Gateway writer did not stop in time");
            }
        }
        self.link.set_connected(false);
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), BroadcastError> {
        if !self.is_connected() {
            return Err(BroadcastError::NotConnected);
        }
        let frame = Frame {
            kind: event.kind(),
            text: event
                .to_frame()
                .map_err(|e| BroadcastError::Serialization(e.to_string()))?,
        };
        self.queue_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => BroadcastError::QueueFull,
            TrySendError::Closed(_) => BroadcastError::Closed,
        })
    }
}

// =============================================================================
// Writer Task
// =============================================================================

struct Writer {
    config: GatewayConfig,
    link: Arc<LinkState>,
    cancel: CancellationToken,
}

impl Writer {
    async fn run(self, mut queue: mpsc::Receiver<Frame>) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.dial().await {
                Ok(socket) => {
                    policy.reset();
                    self.link.set_connected(true);
                    tracing::info!(url = %self.config.url, "Gateway connected");

                    let result = self.pump(socket, &mut queue).await;
                    self.link.set_connected(false);
                    self.drop_queued(&mut queue);

                    match result {
                        Ok(()) => break,
                        Err(e) => tracing::warn!(error = %e, "Gateway connection lost"),
                    }
                }
                Err(e) => tracing::warn!(url = %self.config.url, error = %e, "Gateway connect failed"),
            }

            let Some(delay) = policy.next_delay() else {
                let error = ReconnectError::MaxAttemptsExceeded(policy.attempt_count());
                tracing::error!(error = %error, "Gateway link abandoned");
                break;
            };
            self.link.reconnects.fetch_add(1, Ordering::Relaxed);
            metrics::record_gateway_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to gateway"
            );

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.link.set_connected(false);
        tracing::info!("Gateway writer stopped");
    }

    async fn dial(&self) -> Result<Socket, GatewayError> {
        let connect = tokio_tungstenite::connect_async(self.config.url.as_str());
        let (socket, _response) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| GatewayError::ConnectionFailed("connect timed out".to_string()))??;
        Ok(socket)
    }

    /// Serve one connection. `Ok` means shutdown was requested.
    async fn pump(
        &self,
        socket: Socket,
        queue: &mut mpsc::Receiver<Frame>,
    ) -> Result<(), GatewayError> {
        let (mut write, mut read) = socket.split();
        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_pong = Instant::now();
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                frame = queue.recv() => {
                    let Some(frame) = frame else {
                        return Ok(());
                    };
                    if let Err(e) = write.send(Message::Text(frame.text.into())).await {
                        self.count_dropped(frame.kind, 1);
                        return Err(e.into());
                    }
                    self.link.frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                _ = ping.tick() => {
                    if waiting_for_pong && last_pong.elapsed() > self.config.pong_timeout {
                        return Err(GatewayError::HeartbeatTimeout);
                    }
                    write.send(Message::Ping(Vec::<u8>::new().into())).await?;
                    waiting_for_pong = true;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(GatewayError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            tracing::trace!("Ignoring inbound gateway frame");
                        }
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    fn drop_queued(&self, queue: &mut mpsc::Receiver<Frame>) {
        while let Ok(frame) = queue.try_recv() {
            self.count_dropped(frame.kind, 1);
        }
    }

    fn count_dropped(&self, kind: EventKind, count: u64) {
        self.link.frames_dropped.fetch_add(count, Ordering::Relaxed);
        metrics::record_dropped(kind, DropReason::TransportError, count);
    }
}

// =============================================================================
// Tests
// =============================================================================
