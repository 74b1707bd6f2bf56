use async_trait::async_trait;
use futures::StreamExt as _;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{FrameStream, Transport};
use crate::Result;

/// WebSocket transport for servers that push over a WebSocket instead of an event stream.
///
/// Only server-to-client text frames are consumed; nothing is ever written by the client.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &Url) -> Result<FrameStream> {
        let (ws_stream, _) = connect_async(endpoint.as_str()).await?;

        let frames = ws_stream
            .take_while(|msg| {
                let open = !matches!(msg, Ok(Message::Close(_)));
                async move { open }
            })
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    // Undecodable bytes surface later as a malformed frame, not a transport error
                    Ok(Message::Binary(bytes)) => {
                        Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(e.into())),
                }
            });

        Ok(frames.boxed())
    }
}
