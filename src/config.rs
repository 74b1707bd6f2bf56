use std::time::Duration;

use bon::Builder;

use crate::backoff;

const DEFAULT_INITIAL_DELAY_DURATION: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_DELAY_DURATION: Duration = Duration::from_millis(30_000);
/// Broadcast channel capacity for dispatched messages.
const DEFAULT_MESSAGE_CAPACITY: usize = 1024;

/// Configuration for [`Client`](crate::Client) behavior.
///
/// Supplied at construction. Reconnect settings can later be replaced through
/// [`Client::update_config`](crate::Client::update_config); the new values apply from the next
/// scheduled retry onwards, never to a connection that is already open.
#[non_exhaustive]
#[derive(Clone, Debug, Builder)]
pub struct Config {
    /// Whether the client is allowed to connect at all. When `false`, `connect` is a no-op
    /// until the client is enabled.
    #[builder(default = true)]
    pub enabled: bool,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Drop and re-open the connection when no heartbeat arrives for this long while
    /// connected. Disabled when `None`.
    pub heartbeat_timeout: Option<Duration>,
    /// Number of messages buffered for each [`Client::subscribe`](crate::Client::subscribe)
    /// receiver before it starts lagging.
    #[builder(default = DEFAULT_MESSAGE_CAPACITY)]
    pub message_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Builder)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    #[builder(default = DEFAULT_INITIAL_DELAY_DURATION)]
    pub initial_delay: Duration,
    /// Ceiling for the reconnection delay
    #[builder(default = DEFAULT_MAX_DELAY_DURATION)]
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY_DURATION,
            max_delay: DEFAULT_MAX_DELAY_DURATION,
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait after `attempt` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = backoff::delay(
            attempt,
            saturating_millis(self.initial_delay),
            saturating_millis(self.max_delay),
        );

        Duration::from_millis(millis)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
