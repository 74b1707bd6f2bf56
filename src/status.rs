use serde::Serialize;
use tokio::time::Instant;

use crate::connection::ConnectionState;
use crate::heartbeat::HeartbeatState;

/// Liveness of the stream as shown to a user.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Connected and at least one heartbeat has been received
    Live,
    /// The transport is not healthy
    Stale,
    /// Connected but no heartbeat has been received yet
    None,
}

/// Small discrete status record for indicators.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub connected: bool,
    pub liveness: Liveness,
    pub seconds_since_heartbeat: Option<u64>,
}

/// Combine connection state and heartbeat tracking into a [`StatusRecord`].
///
/// Pure: it can be evaluated at any rate without touching the connection.
#[must_use]
pub fn project(state: ConnectionState, heartbeat: &HeartbeatState, now: Instant) -> StatusRecord {
    let seconds_since_heartbeat = heartbeat.staleness(now);

    if state.is_connected() {
        let liveness = if heartbeat.last_heartbeat_at.is_some() {
            Liveness::Live
        } else {
            Liveness::None
        };

        StatusRecord {
            connected: true,
            liveness,
            seconds_since_heartbeat,
        }
    } else {
        StatusRecord {
            connected: false,
            liveness: Liveness::Stale,
            seconds_since_heartbeat,
        }
    }
}
