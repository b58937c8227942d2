use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use http::header::AUTHORIZATION;
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::auth::credentials::CredentialStore;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::notifications::feed::NotificationFeed;
use crate::notifications::frame::{Frame, FrameCommand};
use crate::notifications::{Notification, NotificationDto};

/// WebSocket connection timeout in seconds
const WEBSOCKET_CONNECT_TIMEOUT_SECS: u64 = 10;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the read loop ended
enum LoopExit {
    /// Teardown was requested; do not reconnect
    Shutdown,
    /// The transport dropped; reconnect after the fixed delay
    Disconnected,
}

/// Manager of the realtime notification channel
///
/// One logical connection to the broker, authenticated with whatever
/// access token is current at connect time. The credential of a live
/// connection is immutable; a token change always goes through
/// `reconnect()` (full teardown, debounce, fresh connect), never through
/// in-place re-authentication.
pub struct NotificationChannel {
    config: Arc<ClientConfig>,
    credentials: CredentialStore,
    feed: Arc<NotificationFeed>,
    /// Shutdown sender for the live worker; doubles as the "channel is
    /// running" guard that makes `init()` idempotent
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
    /// Serializes init/reconnect cycles so two rapid `reconnect()` calls
    /// settle to exactly one live connection
    lifecycle_gate: Arc<Mutex<()>>,
    /// Active subscription ids by destination
    subscriptions: Arc<DashMap<String, String>>,
}

impl NotificationChannel {
    /// Create a new channel manager
    pub fn new(
        config: Arc<ClientConfig>,
        credentials: CredentialStore,
        feed: Arc<NotificationFeed>,
    ) -> Self {
        Self {
            config,
            credentials,
            feed,
            shutdown_tx: Arc::new(RwLock::new(None)),
            lifecycle_gate: Arc::new(Mutex::new(())),
            subscriptions: Arc::new(DashMap::new()),
        }
    }

    /// Start the channel: load the unread snapshot, then connect.
    ///
    /// Idempotent; calling it again while the channel is running is a
    /// no-op and performs neither the snapshot fetch nor a second
    /// connect.
    pub async fn init(&self) -> ClientResult<()> {
        let _gate = self.lifecycle_gate.lock().await;

        if self.shutdown_tx.read().await.is_some() {
            debug!("Notification channel already running, init is a no-op");
            return Ok(());
        }

        // Snapshot first so the unread list is populated before live
        // messages start prepending to it
        self.feed.refresh_unread().await?;
        self.spawn_worker().await;
        Ok(())
    }

    /// Tear the channel down and connect again with the current token
    ///
    /// The debounce between teardown and connect lets the old socket's
    /// close handshake complete before the replacement forms; it is not a
    /// retry backoff. The access token is read after the delay, so a
    /// reconnect racing a logout ends up connecting with nothing and
    /// simply stays down.
    pub async fn reconnect(&self) {
        let _gate = self.lifecycle_gate.lock().await;

        let was_running = self.stop_worker().await;
        if !was_running {
            debug!("Notification channel was never started, skipping reconnect");
            return;
        }

        tokio::time::sleep(self.config.reconnect_debounce()).await;

        if self.credentials.access_token().await.is_none() {
            info!("No credential after reconnect debounce, leaving channel down");
            return;
        }

        self.spawn_worker().await;
    }

    /// Deactivate the channel
    ///
    /// Safe to call when the channel never connected.
    pub async fn teardown(&self) {
        let _gate = self.lifecycle_gate.lock().await;
        self.stop_worker().await;
    }

    /// Whether a worker is currently running
    pub async fn is_running(&self) -> bool {
        self.shutdown_tx.read().await.is_some()
    }

    /// Signal the live worker to stop, if there is one
    async fn stop_worker(&self) -> bool {
        let taken = self.shutdown_tx.write().await.take();
        self.subscriptions.clear();
        match taken {
            Some(tx) => {
                // The worker may already be gone; that is fine
                let _ = tx.send(()).await;
                info!("Notification channel shut down");
                true
            }
            None => {
                debug!("Notification channel not running");
                false
            }
        }
    }

    /// Spawn the connection worker
    async fn spawn_worker(&self) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let worker = ChannelWorker {
            config: Arc::clone(&self.config),
            credentials: self.credentials.clone(),
            feed: Arc::clone(&self.feed),
            subscriptions: Arc::clone(&self.subscriptions),
        };

        tokio::spawn(async move {
            worker.run(shutdown_rx).await;
        });
    }
}

/// The connection worker owned by a single channel generation
#[derive(Clone)]
struct ChannelWorker {
    config: Arc<ClientConfig>,
    credentials: CredentialStore,
    feed: Arc<NotificationFeed>,
    subscriptions: Arc<DashMap<String, String>>,
}

impl ChannelWorker {
    /// Connection loop: establish, pump, reconnect on drop
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        loop {
            // Establish the connection with fixed-delay, indefinite
            // retries; drops are never surfaced to the user
            let strategy = FixedInterval::new(self.config.transport_reconnect_delay());
            let worker = self.clone();
            let connect = Retry::spawn(strategy, move || {
                let worker = worker.clone();
                async move { worker.connect_once().await }
            });

            let ws = tokio::select! {
                _ = shutdown_rx.recv() => break,
                result = connect => match result {
                    Ok(ws) => ws,
                    Err(e) => {
                        error!(error = %e, "Notification channel could not connect");
                        continue;
                    }
                },
            };

            match self.read_loop(ws, &mut shutdown_rx).await {
                LoopExit::Shutdown => break,
                LoopExit::Disconnected => {
                    self.subscriptions.clear();
                    warn!(
                        delay_secs = self.config.transport_reconnect_delay_secs,
                        "Notification channel dropped, reconnecting after fixed delay"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(self.config.transport_reconnect_delay()) => {}
                    }
                }
            }
        }

        self.subscriptions.clear();
        debug!("Notification channel worker exited");
    }

    /// One connect attempt: socket, broker handshake, subscription
    async fn connect_once(&self) -> ClientResult<WsStream> {
        // The token is read here, at connect time, not captured earlier
        let token = self.credentials.access_token().await;
        let url = self.config.ws_url(token.as_deref());

        let mut request = url
            .into_client_request()
            .map_err(ClientError::channel)?;
        if let Some(token) = token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(ClientError::channel)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (mut ws, _response) = connect_async(request).await.map_err(|e| {
            warn!(error = %e, "WebSocket connect failed");
            ClientError::channel(e)
        })?;

        // Broker handshake
        let heartbeat_ms = self.config.heartbeat_interval().as_millis() as u64;
        let connect_frame = Frame::connect(heartbeat_ms, token.as_deref());
        ws.send(WsMessage::Text(connect_frame.encode().into()))
            .await
            .map_err(ClientError::channel)?;

        let handshake = async {
            while let Some(message) = ws.next().await {
                let message = message.map_err(ClientError::channel)?;
                if let WsMessage::Text(text) = message {
                    if Frame::is_heartbeat(text.as_str()) {
                        continue;
                    }
                    let frame = Frame::parse(text.as_str())?;
                    match frame.command {
                        FrameCommand::Connected => return Ok(()),
                        FrameCommand::Error => {
                            return Err(ClientError::channel(format!(
                                "broker rejected connect: {}",
                                frame.body
                            )));
                        }
                        _ => continue,
                    }
                }
            }
            Err(ClientError::channel("socket closed during handshake"))
        };
        tokio::time::timeout(
            Duration::from_secs(WEBSOCKET_CONNECT_TIMEOUT_SECS),
            handshake,
        )
        .await
        .map_err(|_| {
            warn!("Timed out waiting for broker CONNECTED frame");
            ClientError::channel("timed out waiting for CONNECTED")
        })??;

        // Subscribe to the per-user notification queue
        let destination = self.config.notification_destination.clone();
        let subscription_id = format!("sub-{}", uuid::Uuid::new_v4());
        ws.send(WsMessage::Text(
            Frame::subscribe(&subscription_id, &destination).encode().into(),
        ))
        .await
        .map_err(ClientError::channel)?;
        self.subscriptions.insert(destination.clone(), subscription_id);

        info!(destination = %destination, "Notification channel connected");
        Ok(ws)
    }

    /// Pump the live connection until it drops or teardown is requested
    async fn read_loop(&self, ws: WsStream, shutdown_rx: &mut mpsc::Receiver<()>) -> LoopExit {
        // Split the socket so one arm can read while another writes
        let (mut ws_sender, mut ws_receiver) = ws.split();

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        // First tick completes immediately; skip it
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    self.close_gracefully(&mut ws_sender).await;
                    return LoopExit::Shutdown;
                }

                _ = heartbeat.tick() => {
                    // Heart-beats in both directions: broker newline plus
                    // a transport-level ping
                    if ws_sender.send(WsMessage::Text(Frame::HEARTBEAT.into())).await.is_err() {
                        return LoopExit::Disconnected;
                    }
                    if ws_sender.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        return LoopExit::Disconnected;
                    }
                }

                message = ws_receiver.next() => match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.handle_text(text.as_str()).await;
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        let _ = ws_sender.send(WsMessage::Pong(payload)).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("Received transport pong");
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("Broker closed the notification channel");
                        return LoopExit::Disconnected;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Notification channel transport error");
                        return LoopExit::Disconnected;
                    }
                    None => {
                        info!("Notification channel stream ended");
                        return LoopExit::Disconnected;
                    }
                }
            }
        }
    }

    /// Handle an inbound text payload
    async fn handle_text(&self, raw: &str) {
        if Frame::is_heartbeat(raw) {
            return;
        }

        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping unparseable broker frame");
                return;
            }
        };

        match frame.command {
            FrameCommand::Message => match serde_json::from_str::<NotificationDto>(&frame.body) {
                Ok(dto) => {
                    self.feed.push_incoming(Notification::from(dto)).await;
                }
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable notification payload");
                }
            },
            FrameCommand::Error => {
                warn!(body = %frame.body, "Broker error frame");
            }
            other => {
                debug!(command = other.as_str(), "Ignoring broker frame");
            }
        }
    }

    /// Unsubscribe and close before dropping the socket
    async fn close_gracefully(&self, ws_sender: &mut SplitSink<WsStream, WsMessage>) {
        for entry in self.subscriptions.iter() {
            let frame = Frame::unsubscribe(entry.value());
            let _ = ws_sender.send(WsMessage::Text(frame.encode().into())).await;
        }
        let _ = ws_sender
            .send(WsMessage::Text(Frame::disconnect().encode().into()))
            .await;
        let _ = ws_sender.close().await;
    }
}
