//! Frame decoding and delivery to consumers.

use std::fmt;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::error::Error;
use crate::heartbeat::{HeartbeatMonitor, HeartbeatState};
use crate::message::{InboundMessage, parse_frame};

pub type MessageCallback = Box<dyn FnMut(&InboundMessage) + Send>;
pub type OpenCallback = Box<dyn FnMut() + Send>;
pub type ErrorCallback = Box<dyn FnMut(&Error) + Send>;

/// Consumer callbacks.
///
/// The table is owned by the client's lifecycle task and looked up every time an event is
/// delivered, so replacing it through [`Client::set_callbacks`](crate::Client::set_callbacks)
/// takes effect for the very next event without touching the connection.
#[non_exhaustive]
#[derive(Default)]
pub struct Callbacks {
    /// Invoked for every parsed message, heartbeats included
    pub on_message: Option<MessageCallback>,
    /// Invoked when a connection has been opened
    pub on_open: Option<OpenCallback>,
    /// Invoked when a connection attempt fails or an open connection drops
    pub on_error: Option<ErrorCallback>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.on_message = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_open<F>(mut self, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_open = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Routes decoded messages to the heartbeat monitor and to consumers.
pub(crate) struct Dispatcher {
    callbacks: Callbacks,
    heartbeat: HeartbeatMonitor,
    broadcast_tx: broadcast::Sender<InboundMessage>,
}

impl Dispatcher {
    pub(crate) fn new(callbacks: Callbacks, capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            callbacks,
            heartbeat: HeartbeatMonitor::new(),
            broadcast_tx,
        }
    }

    /// Decode `frame` and deliver every message it carries, in order.
    ///
    /// A frame that fails to decode is logged and dropped; it never reaches the caller.
    /// `is_live` is checked before every message, so a batch stops as soon as the connection
    /// it arrived on has been superseded, including by a callback disconnecting mid-batch.
    pub(crate) fn on_frame<F>(&mut self, frame: &str, now: Instant, is_live: F)
    where
        F: Fn() -> bool,
    {
        let messages = match parse_frame(frame) {
            Ok(messages) => messages,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%frame, error = %e, "Failed to parse stream message");
                #[cfg(not(feature = "tracing"))]
                let _ = (&frame, &e);
                return;
            }
        };

        for message in messages {
            if !is_live() {
                #[cfg(feature = "tracing")]
                tracing::trace!("Connection superseded, dropping rest of frame");
                return;
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(?message, "Dispatching stream message");

            if message.is_heartbeat() {
                self.heartbeat.record_heartbeat(now);
            }

            if let Some(on_message) = self.callbacks.on_message.as_mut() {
                on_message(&message);
            }

            // No subscribers is not an error
            _ = self.broadcast_tx.send(message);
        }
    }

    pub(crate) fn notify_open(&mut self) {
        if let Some(on_open) = self.callbacks.on_open.as_mut() {
            on_open();
        }
    }

    pub(crate) fn notify_error(&mut self, error: &Error) {
        if let Some(on_error) = self.callbacks.on_error.as_mut() {
            on_error(error);
        }
    }

    pub(crate) fn replace_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    pub(crate) fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub(crate) fn heartbeat_receiver(&self) -> watch::Receiver<HeartbeatState> {
        self.heartbeat.subscribe()
    }

    pub(crate) fn broadcaster(&self) -> broadcast::Sender<InboundMessage> {
        self.broadcast_tx.clone()
    }
}
