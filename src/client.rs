use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use crate::Result;
use crate::config::{Config, ReconnectConfig};
use crate::connection::{
    Command, ConnectionState, Control, LifecycleManager, SharedControl, Snapshot, lock,
};
use crate::dispatch::{Callbacks, Dispatcher};
use crate::error::{Error, Lagged};
use crate::heartbeat::HeartbeatState;
use crate::message::InboundMessage;
use crate::status::{StatusRecord, project};
use crate::transport::Transport;

/// Default cadence of [`Client::status_stream`].
pub const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Client for a server-pushed JSON event stream.
///
/// Keeps at most one connection open, re-opens it with exponential backoff whenever it fails,
/// tracks `HEARTBEAT` messages and delivers every message to the registered [`Callbacks`] and
/// to [`Client::subscribe`] receivers.
///
/// Every method returns immediately; the connection is driven by a background task that lives
/// as long as at least one clone of the client.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
///
/// use pushfeed_client::{Callbacks, Client, Config};
/// use pushfeed_client::transport::SseTransport;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new(
///         "https://feeds.example.com/events",
///         Config::default(),
///         SseTransport::default(),
///     )?;
///
///     client.set_callbacks(
///         Callbacks::new()
///             .on_message(|msg| println!("{}: {}", msg.msg_type, msg.data))
///             .on_error(|e| eprintln!("stream error: {e}")),
///     );
///     client.connect();
///
///     tokio::time::sleep(Duration::from_secs(60)).await;
///     client.shutdown();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Target of every connection attempt
    endpoint: Url,
    /// Flags shared with the lifecycle task
    control: SharedControl,
    /// Commands for the lifecycle task
    commands_tx: mpsc::UnboundedSender<Command>,
    /// Latest lifecycle snapshot
    snapshot_rx: watch::Receiver<Snapshot>,
    /// Latest heartbeat state
    heartbeat_rx: watch::Receiver<HeartbeatState>,
    /// Broadcast sender for dispatched messages
    broadcast_tx: broadcast::Sender<InboundMessage>,
    /// Stops the lifecycle task
    shutdown: CancellationToken,
    /// Cancels `shutdown` once the last clone is dropped
    _shutdown_guard: DropGuard,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("snapshot", &self.snapshot())
            .field("enabled", &self.is_enabled())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client for `endpoint` and start its lifecycle task.
    ///
    /// The client starts in [`ConnectionState::Disconnected`]; call [`Client::connect`] to
    /// open the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid URL or if no Tokio runtime is running.
    pub fn new<T: Transport>(endpoint: &str, config: Config, transport: T) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::validation(format!("client requires a Tokio runtime: {e}")))?;

        let control = Arc::new(Mutex::new(Control {
            generation: 0,
            reconnect: true,
            enabled: config.enabled,
        }));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let dispatcher = Dispatcher::new(Callbacks::default(), config.message_capacity);
        let heartbeat_rx = dispatcher.heartbeat_receiver();
        let broadcast_tx = dispatcher.broadcaster();
        let shutdown = CancellationToken::new();

        let manager = LifecycleManager::new(
            endpoint.clone(),
            Arc::new(transport),
            config,
            Arc::clone(&control),
            commands_tx.clone(),
            commands_rx,
            snapshot_tx,
            dispatcher,
            shutdown.clone(),
        );
        runtime.spawn(manager.run());

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoint,
                control,
                commands_tx,
                snapshot_rx,
                heartbeat_rx,
                broadcast_tx,
                _shutdown_guard: shutdown.clone().drop_guard(),
                shutdown,
            }),
        })
    }

    /// Open the stream.
    ///
    /// No-op while disabled, after [`Client::shutdown`], or while an attempt is already
    /// connecting or connected. Clears the effect of an earlier [`Client::disconnect`].
    pub fn connect(&self) {
        lock(&self.inner.control).reconnect = true;
        self.send(Command::Connect);
    }

    /// Close the stream and stop reconnecting.
    ///
    /// Cancels any pending retry. Once this returns, no callback fires for the closed
    /// connection, even for events that were already in flight.
    pub fn disconnect(&self) {
        {
            let mut control = lock(&self.inner.control);
            control.reconnect = false;
            control.generation = control.generation.wrapping_add(1);
        }
        self.send(Command::Disconnect);
    }

    /// Enable or disable the client.
    ///
    /// Disabling behaves as [`Client::disconnect`], enabling as [`Client::connect`].
    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.inner.control).enabled = enabled;

        if enabled {
            self.connect();
        } else {
            self.disconnect();
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        lock(&self.inner.control).enabled
    }

    /// Replace the reconnection settings. Applies from the next scheduled retry.
    pub fn update_config(&self, reconnect: ReconnectConfig) {
        self.send(Command::UpdateConfig(reconnect));
    }

    /// Replace the consumer callbacks. The next event is delivered to the new table.
    pub fn set_callbacks(&self, callbacks: Callbacks) {
        self.send(Command::SetCallbacks(callbacks));
    }

    /// Permanently tear the client down. Every later call is a no-op.
    pub fn shutdown(&self) {
        self.disconnect();
        self.inner.shutdown.cancel();
    }

    /// Whether [`Client::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.snapshot_rx.borrow().state
    }

    /// Get the current connection state together with retry bookkeeping.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.inner.snapshot_rx.borrow()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot_rx.clone()
    }

    #[must_use]
    pub fn heartbeat(&self) -> HeartbeatState {
        *self.inner.heartbeat_rx.borrow()
    }

    /// Subscribe to heartbeats. The receiver is marked changed on every beat.
    #[must_use]
    pub fn heartbeat_receiver(&self) -> watch::Receiver<HeartbeatState> {
        self.inner.heartbeat_rx.clone()
    }

    /// Current status for indicators.
    #[must_use]
    pub fn status(&self) -> StatusRecord {
        project(self.state(), &self.heartbeat(), Instant::now())
    }

    /// Yield [`Client::status`] every `period`, starting immediately.
    ///
    /// The stream holds a clone of the client, keeping the connection alive while it is polled.
    /// A zero `period` falls back to [`STATUS_INTERVAL`].
    pub fn status_stream(&self, period: Duration) -> impl Stream<Item = StatusRecord> + use<> {
        let client = self.clone();
        let period = if period.is_zero() {
            STATUS_INTERVAL
        } else {
            period
        };

        stream! {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                yield client.status();
            }
        }
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can receive messages
    /// concurrently without blocking each other or the dispatcher.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Stream of incoming messages.
    ///
    /// Yields an error carrying [`Lagged`] when the subscriber fell behind, then resumes with
    /// the oldest message still buffered. Ends once the client is dropped.
    pub fn messages(&self) -> impl Stream<Item = Result<InboundMessage>> + use<> {
        let mut rx = self.subscribe();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield Ok(message),
                    Err(RecvError::Lagged(count)) => yield Err(Lagged { count }.into()),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    fn send(&self, command: Command) {
        if self.inner.commands_tx.send(command).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Client torn down, ignoring command");
        }
    }
}
