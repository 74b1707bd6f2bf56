//! Connects to a Server-Sent Events feed and prints the connection status once per second.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,pushfeed_client=debug cargo run --example status --features sse,tracing -- https://feeds.example.com/events
//! ```
//!
//! The endpoint can also be provided through `PUSHFEED_ENDPOINT`.

use std::env;
use std::time::Duration;

use futures::StreamExt as _;
use pushfeed_client::transport::SseTransport;
use pushfeed_client::{Callbacks, Client, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "https://feeds.example.com/events";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = env::args()
        .nth(1)
        .or_else(|| env::var("PUSHFEED_ENDPOINT").ok())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());

    let config = Config::builder()
        .heartbeat_timeout(Duration::from_secs(30))
        .build();
    let client = Client::new(&endpoint, config, SseTransport::default())?;

    client.set_callbacks(
        Callbacks::new()
            .on_open(|| info!("stream opened"))
            .on_message(|msg| {
                if !msg.is_heartbeat() {
                    info!(msg_type = %msg.msg_type, data = %msg.data, "message");
                }
            })
            .on_error(|e| warn!(error = %e, "stream error")),
    );
    client.connect();

    let mut statuses = Box::pin(client.status_stream(Duration::from_secs(1)).take(30));
    while let Some(status) = statuses.next().await {
        info!(
            status = %serde_json::to_string(&status)?,
            retries = client.snapshot().retries,
        );
    }

    client.shutdown();
    Ok(())
}
