//! Heartbeat tracking.
//!
//! [`HeartbeatMonitor`] records the instant of the last `HEARTBEAT` frame and publishes it on a
//! [`watch`] channel. Every recorded beat notifies observers, which is what a presentation
//! layer uses to flash a beat indicator; see [`HeartbeatState::is_beating`].

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// How long the beat indicator stays lit after a heartbeat.
pub const BEAT_WINDOW: Duration = Duration::from_millis(500);

/// Snapshot of heartbeat tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatState {
    /// When the most recent heartbeat was recorded, if any
    pub last_heartbeat_at: Option<Instant>,
}

impl HeartbeatState {
    /// Whole seconds elapsed since the last heartbeat, or `None` if none was ever recorded.
    ///
    /// An instant earlier than the last heartbeat yields zero.
    #[must_use]
    pub fn staleness(&self, now: Instant) -> Option<u64> {
        self.last_heartbeat_at
            .map(|last| now.saturating_duration_since(last).as_secs())
    }

    /// Whether a heartbeat arrived within the last [`BEAT_WINDOW`].
    ///
    /// Each new heartbeat restarts the window; once it elapses the indicator clears on its own.
    #[must_use]
    pub fn is_beating(&self, now: Instant) -> bool {
        self.last_heartbeat_at
            .is_some_and(|last| now.saturating_duration_since(last) < BEAT_WINDOW)
    }
}

/// Tracks liveness signals of one client.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    state_tx: watch::Sender<HeartbeatState>,
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(HeartbeatState::default());
        Self { state_tx }
    }

    /// Record a heartbeat observed at `now` and notify observers of the beat.
    ///
    /// The stored instant never moves backwards.
    pub fn record_heartbeat(&self, now: Instant) {
        self.state_tx.send_modify(|state| {
            let last = state.last_heartbeat_at.map_or(now, |last| last.max(now));
            state.last_heartbeat_at = Some(last);
        });
    }

    /// Whole seconds since the last heartbeat; see [`HeartbeatState::staleness`].
    #[must_use]
    pub fn staleness(&self, now: Instant) -> Option<u64> {
        self.state().staleness(now)
    }

    #[must_use]
    pub fn state(&self) -> HeartbeatState {
        *self.state_tx.borrow()
    }

    /// Subscribe to beats. The receiver is marked changed on every recorded heartbeat.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HeartbeatState> {
        self.state_tx.subscribe()
    }
}
