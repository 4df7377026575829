//! The async transport seam between the engine and the wire.
//!
//! Production uses the websocket implementation in the engine crate;
//! tests drive the engine through `flusso-mock`'s in-memory pair.

use async_trait::async_trait;

use crate::FlussoError;

/// Factory opening one stream per URL.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type produced by [`connect`](Self::connect).
    type Stream: TransportStream;

    /// Open a stream to `url`.
    ///
    /// # Errors
    /// Returns [`FlussoError::Connectivity`] when the peer is
    /// unreachable or the handshake fails.
    async fn connect(&self, url: &str) -> Result<Self::Stream, FlussoError>;
}

/// One bidirectional text-frame stream.
///
/// The connection actor is the stream's only owner; no splitting or
/// locking is required.
#[async_trait]
pub trait TransportStream: Send + 'static {
    /// Send one text frame.
    ///
    /// # Errors
    /// Returns [`FlussoError::Connectivity`] when the peer is gone.
    async fn send(&mut self, text: String) -> Result<(), FlussoError>;

    /// Receive the next text frame. `None` means the peer closed the
    /// stream; `Some(Err(_))` is an unrecoverable transport error.
    async fn recv(&mut self) -> Option<Result<String, FlussoError>>;

    /// Close the stream, best effort.
    async fn close(&mut self);
}
