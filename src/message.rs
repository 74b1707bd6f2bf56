use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved message type signaling that the stream is alive.
pub const HEARTBEAT: &str = "HEARTBEAT";

/// Envelope of every message pushed by the server.
///
/// The core only interprets [`HEARTBEAT`]; every other type (for example `APP_ADDED` or
/// `BOOKMARK_REMOVED`) is passed through to the consumer untouched.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InboundMessage {
    /// The message type
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Event-specific payload, `null` when the server omits it
    #[serde(default)]
    pub data: Value,
    /// Server-side timestamp, when provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl InboundMessage {
    #[must_use]
    pub fn new<S: Into<String>>(msg_type: S, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
            timestamp: None,
        }
    }

    /// Whether this message is a liveness signal rather than domain data.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.msg_type == HEARTBEAT
    }
}

/// Decode one raw frame into the messages it carries.
///
/// An empty or whitespace-only frame is a keepalive and carries no message. A JSON array is a
/// batch whose elements keep their order. Anything else must be a single envelope object.
pub fn parse_frame(frame: &str) -> crate::Result<Vec<InboundMessage>> {
    let trimmed = frame.trim();

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        Ok(serde_json::from_str(trimmed)?)
    } else {
        let msg: InboundMessage = serde_json::from_str(trimmed)?;
        Ok(vec![msg])
    }
}
