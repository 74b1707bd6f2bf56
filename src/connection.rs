#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{Config, ReconnectConfig};
use crate::dispatch::{Callbacks, Dispatcher};
use crate::error::Error;
use crate::transport::{Transport, TransportError};

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, and no retry is pending
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected,
    /// The last attempt failed or the connection dropped; a retry may be pending
    Error,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether an attempt is open or in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// Observable lifecycle state, published on every transition.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open
    pub retries: u32,
    /// Delay of the retry currently scheduled, if any
    pub next_retry: Option<Duration>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retries: 0,
            next_retry: None,
        }
    }
}

/// Flags shared by the client handle and the lifecycle task.
///
/// `generation` identifies the current connection attempt. The handle bumps it when it
/// disconnects so that transport events already queued are discarded before the lifecycle task
/// acts on them.
#[derive(Debug)]
pub(crate) struct Control {
    pub(crate) generation: u64,
    pub(crate) reconnect: bool,
    pub(crate) enabled: bool,
}

pub(crate) type SharedControl = Arc<Mutex<Control>>;

pub(crate) fn lock(control: &SharedControl) -> std::sync::MutexGuard<'_, Control> {
    control.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Messages processed by the lifecycle task, in order.
pub(crate) enum Command {
    Connect,
    Disconnect,
    UpdateConfig(ReconnectConfig),
    SetCallbacks(Callbacks),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
}

pub(crate) enum TransportEvent {
    Opened,
    Frame(String),
    Failed(Error),
}

/// Owns the single connection attempt of one client and drives its state machine.
///
/// Runs as one task. Owner commands, transport events, the retry timer and the heartbeat
/// watchdog are all handled on it, so state, retry counter, heartbeat tracking and callbacks
/// are never mutated concurrently.
pub(crate) struct LifecycleManager {
    endpoint: Url,
    transport: Arc<dyn Transport>,
    config: Config,
    control: SharedControl,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,

    state: ConnectionState,
    retries: u32,
    generation: u64,
    retry_at: Option<Instant>,
    next_retry: Option<Duration>,
    connected_at: Option<Instant>,
    connection: Option<CancellationToken>,
}

impl LifecycleManager {
    #[expect(
        clippy::too_many_arguments,
        reason = "All channels are created by the client handle and moved in at once"
    )]
    pub(crate) fn new(
        endpoint: Url,
        transport: Arc<dyn Transport>,
        config: Config,
        control: SharedControl,
        commands_tx: mpsc::UnboundedSender<Command>,
        commands_rx: mpsc::UnboundedReceiver<Command>,
        snapshot_tx: watch::Sender<Snapshot>,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            transport,
            config,
            control,
            commands_tx,
            commands_rx,
            snapshot_tx,
            dispatcher,
            shutdown,
            state: ConnectionState::Disconnected,
            retries: 0,
            generation: 0,
            retry_at: None,
            next_retry: None,
            connected_at: None,
            connection: None,
        }
    }

    /// Process commands until the client is torn down.
    pub(crate) async fn run(mut self) {
        loop {
            let retry_at = self.retry_at;
            let watchdog_at = self.watchdog_deadline();

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                command = self.commands_rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = sleep_until_some(retry_at) => self.on_retry_due(),
                () = sleep_until_some(watchdog_at) => self.on_watchdog_expired(),
            }
        }

        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
            Command::UpdateConfig(reconnect) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(?reconnect, "Reconnect configuration updated");
                self.config.reconnect = reconnect;
            }
            Command::SetCallbacks(callbacks) => self.dispatcher.replace_callbacks(callbacks),
            Command::Transport { generation, event } => {
                // A failed connection may still have frames queued behind its failure
                if !self.is_current(generation) || self.connection.is_none() {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(generation, "Dropping event from superseded connection");
                    return;
                }
                self.on_transport_event(event);
            }
        }
    }

    fn connect(&mut self) {
        if self.state.is_active() {
            return;
        }

        let generation = {
            let mut control = lock(&self.control);
            if !control.enabled || !control.reconnect {
                return;
            }
            control.generation = control.generation.wrapping_add(1);
            control.generation
        };

        self.generation = generation;
        self.retry_at = None;
        self.next_retry = None;
        self.close_connection();
        self.transition(ConnectionState::Connecting);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, generation, retries = self.retries, "Connecting");

        let token = self.shutdown.child_token();
        self.connection = Some(token.clone());

        tokio::spawn(run_connection(
            Arc::clone(&self.transport),
            self.endpoint.clone(),
            generation,
            self.commands_tx.clone(),
            token,
        ));
    }

    fn disconnect(&mut self) {
        let previous = self.state;
        self.retry_at = None;
        self.next_retry = None;
        self.close_connection();
        self.transition(ConnectionState::Disconnected);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, ?previous, "Disconnected");
        #[cfg(not(feature = "tracing"))]
        let _ = previous;
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.retries = 0;
                self.connected_at = Some(Instant::now());

                #[cfg(feature = "tracing")]
                tracing::info!(endpoint = %self.endpoint, "Connected");

                self.transition(ConnectionState::Connected);
                if self.is_current(self.generation) {
                    self.dispatcher.notify_open();
                }
            }
            TransportEvent::Frame(frame) => {
                let (control, generation) = (&self.control, self.generation);
                self.dispatcher
                    .on_frame(&frame, Instant::now(), || lock(control).generation == generation);
            }
            TransportEvent::Failed(error) => self.fail(&error),
        }
    }

    /// Handle an error or close of the current connection.
    fn fail(&mut self, error: &Error) {
        self.close_connection();
        self.transition(ConnectionState::Error);

        if !self.is_current(self.generation) {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %error, "Superseded connection failed, not reported");
            return;
        }
        self.dispatcher.notify_error(error);

        let permitted = {
            let control = lock(&self.control);
            control.enabled && control.reconnect && control.generation == self.generation
        };

        if !permitted {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %error, "Connection failed, reconnection not permitted");
            return;
        }

        let delay = self.config.reconnect.delay_for(self.retries);
        self.retry_at = Some(Instant::now() + delay);
        self.next_retry = Some(delay);
        self.publish();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            endpoint = %self.endpoint,
            error = %error,
            retries = self.retries,
            ?delay,
            "Connection failed, scheduling reconnect"
        );
    }

    fn on_retry_due(&mut self) {
        self.retry_at = None;
        self.next_retry = None;
        self.retries = self.retries.saturating_add(1);
        self.publish();
        self.connect();
    }

    fn on_watchdog_expired(&mut self) {
        if let Some(timeout) = self.config.heartbeat_timeout {
            #[cfg(feature = "tracing")]
            tracing::warn!(?timeout, "Heartbeat timeout, dropping connection");
            self.fail(&TransportError::Timeout(timeout).into());
        }
    }

    /// When the heartbeat watchdog fires, if it is armed.
    fn watchdog_deadline(&self) -> Option<Instant> {
        let timeout = self.config.heartbeat_timeout?;
        if !self.state.is_connected() {
            return None;
        }

        let opened = self.connected_at?;
        let last_seen = self
            .dispatcher
            .heartbeat()
            .state()
            .last_heartbeat_at
            .map_or(opened, |beat| beat.max(opened));

        Some(last_seen + timeout)
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && generation == lock(&self.control).generation
    }

    /// Cancel the connection task, which drops the transport stream.
    fn close_connection(&mut self) {
        if let Some(token) = self.connection.take() {
            token.cancel();
        }
        self.connected_at = None;
    }

    fn transition(&mut self, state: ConnectionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Snapshot {
            state: self.state,
            retries: self.retries,
            next_retry: self.next_retry,
        });
    }

    fn teardown(&mut self) {
        {
            let mut control = lock(&self.control);
            control.reconnect = false;
            control.generation = control.generation.wrapping_add(1);
        }
        self.disconnect();

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "Client torn down");
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Open one connection and forward its events, tagged with `generation`, until it ends or
/// `token` is cancelled.
async fn run_connection(
    transport: Arc<dyn Transport>,
    endpoint: Url,
    generation: u64,
    events: mpsc::UnboundedSender<Command>,
    token: CancellationToken,
) {
    let send = |event| {
        events
            .send(Command::Transport { generation, event })
            .is_ok()
    };

    let opened = tokio::select! {
        biased;

        () = token.cancelled() => return,
        result = transport.open(&endpoint) => result,
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(e) => {
            send(TransportEvent::Failed(e));
            return;
        }
    };

    if !send(TransportEvent::Opened) {
        return;
    }

    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => return,
            frame = frames.next() => match frame {
                Some(Ok(frame)) => {
                    if !send(TransportEvent::Frame(frame)) {
                        return;
                    }
                }
                Some(Err(e)) => {
                    send(TransportEvent::Failed(e));
                    return;
                }
                None => {
                    send(TransportEvent::Failed(TransportError::ConnectionClosed.into()));
                    return;
                }
            },
        }
    }
}
