//! Reconnecting WebSocket client
//!
//! `ConnectionClient` keeps a durable link to the broker for both the
//! producing and the consuming side. Lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Open -> (Closing) -> Disconnected
//! ```
//!
//! - Construction starts the first connect attempt.
//! - On open, a client with a subscription topic sends `SUBSCRIBE` for it
//!   before anything else goes out.
//! - Inbound text frames are passed unmodified to the bound `MessageSink`.
//! - Every close, remote or local, and every failed or timed out connect
//!   attempt queues one reconnect. The reconnect worker waits the configured
//!   delay, gives up if the client is already open again, and otherwise makes
//!   one connect attempt bounded by the connect timeout.
//!
//! One worker task serves all reconnects for the lifetime of the client.
//! Errors are logged and never returned from the lifecycle methods; retrying
//! is unbounded until `shutdown`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Action, ActionType};
use crate::config::ClientSettings;
use crate::transport::encode_action;
use crate::utils::{PubSubError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receiver of inbound payloads.
pub trait MessageSink: Send + Sync + 'static {
    fn on_message(&self, payload: &str);
}

impl<F> MessageSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn on_message(&self, payload: &str) {
        self(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub url: String,
    /// Topic subscribed to on every successful open.
    pub subscription_topic: Option<String>,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscription_topic: None,
            reconnect_delay: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(1000),
        }
    }

    pub fn subscribe_to(mut self, topic: impl Into<String>) -> Self {
        self.subscription_topic = Some(topic.into());
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl From<&ClientSettings> for ClientOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self::new(settings.url.clone())
            .reconnect_delay(Duration::from_millis(settings.reconnect_delay_ms))
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
    }
}

pub struct ConnectionClient {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl ConnectionClient {
    /// Start the client. Must be called from within a tokio runtime.
    ///
    /// Returns immediately; the first connect attempt runs on the client's
    /// reconnect worker.
    pub fn connect(options: ClientOptions, sink: Option<Arc<dyn MessageSink>>) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            options,
            sink,
            state: Mutex::new(ConnectionState::Disconnected),
            outbound: Mutex::new(None),
            generation: AtomicU64::new(0),
            attempts: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
            reconnect_tx,
        });
        let worker = tokio::spawn(run_worker(shared.clone(), reconnect_rx));
        Self { shared, worker }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of connect attempts made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections that reached `Open`.
    pub fn connections_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Serialize an action and queue it on the open connection.
    pub fn send_message(
        &self,
        action_type: ActionType,
        topic: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        let action = Action::new(action_type, topic, payload.map(str::to_string));
        self.shared.send_action(&action)
    }

    /// Queue one delayed reconnect, as a close would.
    pub fn schedule_reconnect(&self) {
        self.shared.schedule_reconnect();
    }

    /// Close the current connection. The client reconnects afterwards just as
    /// it does after a remote close.
    pub fn close(&self) {
        self.shared.close_current();
    }

    /// Close the connection for good and stop the reconnect worker.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down connection to {}", self.shared.options.url);
        self.worker.abort();
        if !self.shared.close_current() {
            // an aborted connect attempt never reaches `on_open`
            self.shared.set_state(ConnectionState::Disconnected);
        }
    }
}

impl Drop for ConnectionClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ConnectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionClient")
            .field("url", &self.shared.options.url)
            .field("state", &self.state())
            .finish()
    }
}

struct Shared {
    options: ClientOptions,
    sink: Option<Arc<dyn MessageSink>>,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<UnboundedSender<WsMessage>>>,
    // bumped on every open so that a stale reader cannot tear down a newer connection
    generation: AtomicU64,
    attempts: AtomicUsize,
    opened: AtomicUsize,
    shut_down: AtomicBool,
    reconnect_tx: UnboundedSender<()>,
}

impl Shared {
    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn schedule_reconnect(&self) {
        if self.is_shut_down() {
            return;
        }
        if self.reconnect_tx.send(()).is_err() {
            debug!("Reconnect worker for {} is gone", self.options.url);
        }
    }

    fn send_action(&self, action: &Action) -> Result<()> {
        let text = encode_action(action)?;
        let outbound = self.outbound.lock();
        let sender = outbound
            .as_ref()
            .ok_or_else(|| PubSubError::Connection(format!("not connected to {}", self.options.url)))?;
        sender
            .send(WsMessage::text(text))
            .map_err(|e| PubSubError::Connection(e.to_string()))
    }

    /// Returns whether there was an open connection to close.
    fn close_current(&self) -> bool {
        let had_connection = {
            let mut outbound = self.outbound.lock();
            let mut state = self.state.lock();
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
            }
            // dropping the sender makes the writer send a close frame
            outbound.take().is_some()
        };
        if !had_connection {
            debug!("No open connection to {} to close", self.options.url);
        }
        had_connection
    }

    async fn attempt_connect(self: &Arc<Self>) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting);

        match tokio::time::timeout(self.options.connect_timeout, connect_async(self.options.url.as_str())).await {
            Ok(Ok((ws, _response))) => self.on_open(ws),
            Ok(Err(e)) => {
                error!("Error connecting to {}: {e}", self.options.url);
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
            Err(_) => {
                debug!(
                    "Connect attempt to {} abandoned after {:?}",
                    self.options.url, self.options.connect_timeout
                );
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn on_open(self: &Arc<Self>, ws: WsStream) {
        let (mut ws_sender, mut ws_receiver) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // the subscription is queued before the sender is published, so it
        // goes out ahead of anything sent through `send_message`
        if let Some(topic) = &self.options.subscription_topic {
            let queued = encode_action(&Action::subscribe(topic.clone()))
                .and_then(|text| {
                    tx.send(WsMessage::text(text))
                        .map_err(|e| PubSubError::Connection(e.to_string()))
                });
            if let Err(e) = queued {
                warn!("Failed to subscribe to {topic}: {e}");
            }
        }

        {
            let mut outbound = self.outbound.lock();
            // shutdown may have run while the handshake was completing
            if self.is_shut_down() {
                *self.state.lock() = ConnectionState::Disconnected;
                return;
            }
            *outbound = Some(tx);
            *self.state.lock() = ConnectionState::Open;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        info!("Connected: {}", self.options.url);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message: {e}");
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let shared = self.clone();
        tokio::spawn(async move {
            let cause = loop {
                match ws_receiver.next().await {
                    Some(Ok(WsMessage::Text(text))) => shared.on_message(text.as_str()),
                    Some(Ok(WsMessage::Close(frame))) => {
                        break match frame {
                            Some(frame) => format!(
                                "Code: {} Reason: {}",
                                u16::from(frame.code),
                                frame.reason.as_str()
                            ),
                            None => "no close frame".to_string(),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Error happened: {e}");
                        break e.to_string();
                    }
                    None => break "stream ended".to_string(),
                }
            };
            shared.on_close(generation, &cause);
        });
    }

    fn on_message(&self, payload: &str) {
        match &self.sink {
            Some(sink) => sink.on_message(payload),
            None => debug!("Message received: {payload}"),
        }
    }

    fn on_close(&self, generation: u64, cause: &str) {
        {
            let mut outbound = self.outbound.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut state = self.state.lock();
            let by = if *state == ConnectionState::Closing { "us" } else { "remote peer" };
            info!("Connection to {} closed by {by}. {cause}", self.options.url);
            *state = ConnectionState::Disconnected;
            outbound.take();
        }
        self.schedule_reconnect();
    }
}

async fn run_worker(shared: Arc<Shared>, mut reconnect_rx: UnboundedReceiver<()>) {
    shared.attempt_connect().await;

    while reconnect_rx.recv().await.is_some() {
        tokio::time::sleep(shared.options.reconnect_delay).await;
        if shared.is_shut_down() {
            break;
        }
        if *shared.state.lock() == ConnectionState::Open {
            info!("Already connected, reconnecting aborted.");
            continue;
        }
        info!("Reconnecting to {}...", shared.options.url);
        shared.attempt_connect().await;
    }
}
