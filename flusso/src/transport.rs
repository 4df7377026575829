//! Websocket transport over `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use flusso_core::{FlussoError, Transport, TransportStream};

/// Production transport: one TLS-capable websocket per URL.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    /// Transport with the given handshake timeout.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Stream = WsStream;

    async fn connect(&self, url: &str) -> Result<Self::Stream, FlussoError> {
        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(url));
        match handshake.await {
            Ok(Ok((inner, _response))) => {
                tracing::debug!(url, "websocket connected");
                Ok(WsStream { inner })
            }
            Ok(Err(error)) => Err(FlussoError::connectivity(format!(
                "websocket handshake with {url} failed: {error}"
            ))),
            Err(_) => Err(FlussoError::connectivity(format!(
                "websocket handshake with {url} timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }
}

/// One open websocket; text and binary frames surface as text, control
/// frames are consumed in place.
pub struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportStream for WsStream {
    async fn send(&mut self, text: String) -> Result<(), FlussoError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|error| FlussoError::connectivity(format!("websocket send failed: {error}")))
    }

    async fn recv(&mut self) -> Option<Result<String, FlussoError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::trace!("dropping non-utf8 binary frame");
                    }
                },
                // Protocol-level pings are answered by tungstenite
                // itself; the application-level keep-alive is JSON.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(_)) => return None,
                Err(error) => {
                    return Some(Err(FlussoError::connectivity(format!(
                        "websocket receive failed: {error}"
                    ))));
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
