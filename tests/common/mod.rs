#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt as _;
use pushfeed_client::error::Error;
use pushfeed_client::transport::{FrameStream, Transport, TransportError};
use pushfeed_client::{Callbacks, Client, ConnectionState, InboundMessage, Snapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use url::Url;

pub const ENDPOINT: &str = "https://feeds.example.com/events";

/// Long enough for any capped backoff to elapse under paused time.
const WAIT: Duration = Duration::from_secs(120);

/// Transport whose connections are opened, fed and failed by the test through [`MockServer`].
pub struct MockTransport {
    opens_tx: mpsc::UnboundedSender<PendingOpen>,
    opens: Arc<AtomicUsize>,
}

pub struct MockServer {
    opens_rx: mpsc::UnboundedReceiver<PendingOpen>,
    opens: Arc<AtomicUsize>,
}

/// An `open` call waiting for the test to accept or reject it.
pub struct PendingOpen {
    pub endpoint: Url,
    result_tx: oneshot::Sender<pushfeed_client::Result<FrameStream>>,
}

/// Server side of one accepted connection.
pub struct MockConnection {
    frames_tx: mpsc::UnboundedSender<pushfeed_client::Result<String>>,
}

#[must_use]
pub fn mock() -> (MockTransport, MockServer) {
    let (opens_tx, opens_rx) = mpsc::unbounded_channel();
    let opens = Arc::new(AtomicUsize::new(0));

    (
        MockTransport {
            opens_tx,
            opens: Arc::clone(&opens),
        },
        MockServer { opens_rx, opens },
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, endpoint: &Url) -> pushfeed_client::Result<FrameStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let (result_tx, result_rx) = oneshot::channel();
        let pending = PendingOpen {
            endpoint: endpoint.clone(),
            result_tx,
        };

        if self.opens_tx.send(pending).is_err() {
            return Err(TransportError::ConnectionClosed.into());
        }

        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed.into()),
        }
    }
}

impl MockServer {
    /// Wait for the client to open a connection.
    pub async fn next_open(&mut self) -> PendingOpen {
        timeout(WAIT, self.opens_rx.recv())
            .await
            .expect("timed out waiting for the client to connect")
            .expect("transport dropped")
    }

    /// A connection opened since the last call, if any.
    pub fn try_next_open(&mut self) -> Option<PendingOpen> {
        self.opens_rx.try_recv().ok()
    }

    /// Number of `open` calls made so far.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PendingOpen {
    #[must_use]
    pub fn accept(self) -> MockConnection {
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
        let frames = stream! {
            while let Some(frame) = frames_rx.recv().await {
                yield frame;
            }
        };

        drop(self.result_tx.send(Ok(frames.boxed())));
        MockConnection { frames_tx }
    }

    pub fn reject(self) {
        drop(
            self.result_tx
                .send(Err(TransportError::EventStream("connection refused".to_owned()).into())),
        );
    }
}

impl MockConnection {
    pub fn send(&self, frame: &str) {
        drop(self.frames_tx.send(Ok(frame.to_owned())));
    }

    pub fn fail(&self, reason: &str) {
        drop(
            self.frames_tx
                .send(Err(TransportError::EventStream(reason.to_owned()).into())),
        );
    }

    /// End the stream as if the server closed it.
    pub fn close(self) {
        drop(self);
    }

    /// Resolves once the client dropped its side of the connection.
    pub async fn closed(&self) {
        timeout(WAIT, self.frames_tx.closed())
            .await
            .expect("client never closed the connection");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.frames_tx.is_closed()
    }
}

/// Callback invocations in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Message(String),
    Error(String),
}

#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    #[must_use]
    pub fn callbacks(&self) -> Callbacks {
        let on_message = Arc::clone(&self.events);
        let on_open = Arc::clone(&self.events);
        let on_error = Arc::clone(&self.events);

        Callbacks::new()
            .on_message(move |msg: &InboundMessage| {
                on_message
                    .lock()
                    .unwrap()
                    .push(Event::Message(msg.msg_type.clone()));
            })
            .on_open(move || on_open.lock().unwrap().push(Event::Open))
            .on_error(move |e: &Error| on_error.lock().unwrap().push(Event::Error(e.to_string())))
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Message(msg_type) => Some(msg_type),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| wanted(event)).count()
    }
}

/// Wait until the client publishes a snapshot in `state`.
pub async fn wait_for_state(client: &Client, state: ConnectionState) -> Snapshot {
    let mut rx = client.state_receiver();
    let snapshot = timeout(WAIT, rx.wait_for(|snapshot| snapshot.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
        .unwrap();

    *snapshot
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
