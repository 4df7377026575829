//! In-memory transport: every `connect` yields a channel-backed stream
//! whose far end pops out of the paired [`MockServer`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use flusso_core::{FlussoError, Transport, TransportStream};

/// Build a connected transport/server pair.
#[must_use]
pub fn pair() -> (MockTransport, MockServer) {
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            inner: Arc::new(Inner {
                conn_tx,
                fail_budget: Mutex::new(0),
            }),
        },
        MockServer { conn_rx },
    )
}

struct Inner {
    conn_tx: mpsc::UnboundedSender<MockPeer>,
    fail_budget: Mutex<u32>,
}

/// Client-side half; hand it to the engine via the builder.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    /// Make the next `n` connect attempts fail, to exercise backoff.
    pub fn fail_next_connects(&self, n: u32) {
        let mut budget = self
            .inner
            .fail_budget
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *budget = n;
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Stream = MockStream;

    async fn connect(&self, url: &str) -> Result<Self::Stream, FlussoError> {
        {
            let mut budget = self
                .inner
                .fail_budget
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *budget > 0 {
                *budget -= 1;
                return Err(FlussoError::connectivity(format!(
                    "mock refused connection to {url}"
                )));
            }
        }
        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            url: url.to_string(),
            rx: to_server_rx,
            tx: to_client_tx,
        };
        self.inner
            .conn_tx
            .send(peer)
            .map_err(|_| FlussoError::connectivity("mock server is gone"))?;
        Ok(MockStream {
            tx: to_server_tx,
            rx: to_client_rx,
        })
    }
}

/// The engine's end of one mock connection.
pub struct MockStream {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl TransportStream for MockStream {
    async fn send(&mut self, text: String) -> Result<(), FlussoError> {
        self.tx
            .send(text)
            .map_err(|_| FlussoError::connectivity("mock peer hung up"))
    }

    async fn recv(&mut self) -> Option<Result<String, FlussoError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Accepts the venue side of each connection the engine opens.
pub struct MockServer {
    conn_rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockServer {
    /// Next connection the engine opened, in connect order. `None`
    /// once every paired transport has been dropped.
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.conn_rx.recv().await
    }
}

/// The venue's end of one mock connection.
pub struct MockPeer {
    url: String,
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

impl MockPeer {
    /// URL the engine connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame the engine sent, in send order. `None` when the
    /// engine closed its end.
    pub async fn sent(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Like [`sent`](Self::sent), parsed as JSON.
    pub async fn sent_json(&mut self) -> Option<Value> {
        let text = self.sent().await?;
        serde_json::from_str(&text).ok()
    }

    /// Deliver a raw frame to the engine. Frames pushed after the
    /// engine closed are silently dropped, like writes to a dead
    /// socket.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.tx.send(frame.into());
    }

    /// Deliver a JSON frame to the engine.
    pub fn push_json(&self, value: &Value) {
        self.push(value.to_string());
    }

    /// Sever the link: the engine observes a peer close.
    pub fn disconnect(self) {}
}
