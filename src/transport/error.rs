#![expect(
    clippy::module_name_repetitions,
    reason = "TransportError includes the module name to indicate its scope"
)]

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Transport error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum TransportError {
    /// Error sending the HTTP request or reading its body
    #[cfg(feature = "sse")]
    Http(reqwest::Error),
    /// The server answered the stream request with a non-success status
    #[cfg(feature = "sse")]
    Status(reqwest::StatusCode),
    /// Error connecting to or reading from the WebSocket server
    #[cfg(feature = "ws")]
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// The event stream could not be decoded
    EventStream(String),
    /// The server closed the connection
    ConnectionClosed,
    /// No heartbeat arrived within the configured window
    Timeout(Duration),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "sse")]
            Self::Http(e) => write!(f, "HTTP stream error: {e}"),
            #[cfg(feature = "sse")]
            Self::Status(status) => write!(f, "stream request failed with status {status}"),
            #[cfg(feature = "ws")]
            Self::WebSocket(e) => write!(f, "WebSocket connection error: {e}"),
            Self::EventStream(reason) => write!(f, "invalid event stream: {reason}"),
            Self::ConnectionClosed => write!(f, "connection closed by server"),
            Self::Timeout(after) => write!(f, "no heartbeat received within {after:?}"),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            #[cfg(feature = "sse")]
            Self::Http(e) => Some(e),
            #[cfg(feature = "ws")]
            Self::WebSocket(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "sse")]
impl From<reqwest::Error> for crate::error::Error {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e).into()
    }
}

#[cfg(feature = "ws")]
impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(e).into()
    }
}
