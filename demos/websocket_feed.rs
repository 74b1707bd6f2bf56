//! Consumes a WebSocket push feed through the message stream.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example websocket_feed --features ws,tracing -- wss://feeds.example.com/ws
//! ```

use std::env;
use std::time::Duration;

use futures::StreamExt as _;
use pushfeed_client::transport::WsTransport;
use pushfeed_client::{Client, Config, ReconnectConfig};
use tokio::time::timeout;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = env::args()
        .nth(1)
        .unwrap_or_else(|| "wss://feeds.example.com/ws".to_owned());

    let config = Config::builder()
        .reconnect(
            ReconnectConfig::builder()
                .initial_delay(Duration::from_millis(500))
                .max_delay(Duration::from_secs(10))
                .build(),
        )
        .build();
    let client = Client::new(&endpoint, config, WsTransport::default())?;

    let mut messages = Box::pin(client.messages());
    client.connect();

    let mut count = 0;
    while let Ok(Some(result)) = timeout(Duration::from_secs(30), messages.next()).await {
        match result {
            Ok(msg) if msg.is_heartbeat() => debug!(state = ?client.state(), "heartbeat"),
            Ok(msg) => {
                info!(msg_type = %msg.msg_type, data = %msg.data);
                count += 1;
                if count >= 20 {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "message stream lagged"),
        }
    }
    info!(received = count, status = ?client.status());

    client.disconnect();
    Ok(())
}
