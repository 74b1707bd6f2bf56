//! Push transports.
//!
//! The lifecycle manager only needs a narrow view of the underlying connection: a way to open
//! it, a stream of raw frames, and a way to close it. [`Transport`] captures exactly that.
//!
//! - [`Transport::open`] resolving to `Ok` is the "open" signal
//! - each `Ok` item of the returned [`FrameStream`] is one frame, i.e. one JSON document
//! - an `Err` item, or the end of the stream, is the "error/close" signal
//! - dropping the [`FrameStream`] closes the connection
//!
//! Two implementations ship behind cargo features: `SseTransport` (`sse`) and
//! `WsTransport` (`ws`).

pub mod error;
#[cfg(feature = "sse")]
pub mod sse;
#[cfg(feature = "ws")]
pub mod ws;

use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

#[expect(
    clippy::module_name_repetitions,
    reason = "TransportError includes the module name for clarity when used outside this module"
)]
pub use error::TransportError;
#[cfg(feature = "sse")]
pub use sse::SseTransport;
#[cfg(feature = "ws")]
pub use ws::WsTransport;

use crate::Result;

/// Stream of raw frames delivered by an open connection.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Opens server-to-client push connections.
///
/// # Example
///
/// ```ignore
/// pub struct Replay(Vec<String>);
///
/// #[async_trait]
/// impl Transport for Replay {
///     async fn open(&self, _endpoint: &Url) -> Result<FrameStream> {
///         Ok(futures::stream::iter(self.0.clone().into_iter().map(Ok)).boxed())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `endpoint`.
    ///
    /// Resolves once the server has accepted the connection. Errors returned here are treated
    /// exactly like errors surfaced later on the stream: they are retried with backoff.
    async fn open(&self, endpoint: &Url) -> Result<FrameStream>;
}
