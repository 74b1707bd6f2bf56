use async_trait::async_trait;
use eventsource_stream::Eventsource as _;
use futures::StreamExt as _;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use url::Url;

use super::{FrameStream, Transport, TransportError};
use crate::Result;

const EVENT_STREAM: &str = "text/event-stream";

/// Server-Sent Events transport.
///
/// Issues a long-lived `GET` against the endpoint and yields the `data` field of every event
/// as one frame. Events without data (comments, bare `retry:` lines) never reach the stream.
#[derive(Clone, Debug, Default)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// Create a transport backed by the provided HTTP client.
    ///
    /// The client should not carry a request timeout, as the stream is meant to stay open
    /// indefinitely.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self, endpoint: &Url) -> Result<FrameStream> {
        let response = self
            .client
            .get(endpoint.clone())
            .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(%status, %endpoint, "Event stream request rejected");
            return Err(TransportError::Status(status).into());
        }

        let frames = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data.is_empty() => None,
                    Ok(event) => Some(Ok(event.data)),
                    Err(e) => Some(Err(TransportError::EventStream(e.to_string()).into())),
                }
            });

        Ok(frames.boxed())
    }
}
