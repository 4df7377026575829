//! The engine facade: a per-URL pool of connection actors plus the
//! subscribe-then-await entry points.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use flusso_core::{FlussoError, Transport, VenueAdapter};
use flusso_types::{EngineConfig, KeepAliveConfig, MessageHash, ReconnectPolicy, SubscriptionKey};

use crate::connection::{Connection, ConnectionHandle};
use crate::transport::WsTransport;

/// Venue-agnostic subscription engine over a [`VenueAdapter`].
///
/// Holds at most one live connection per distinct URL. Connections are
/// created lazily on first use and reused by every later subscription
/// for the same URL; creation is serialized so two concurrent first
/// subscribers share one socket instead of opening two.
pub struct Flusso<A: VenueAdapter, T: Transport = WsTransport> {
    adapter: Arc<A>,
    transport: Arc<T>,
    config: EngineConfig,
    pool: Mutex<HashMap<String, ConnectionHandle<A>>>,
    // Outlives any single connection: ids stay unique per URL across
    // reconnects.
    request_ids: std::sync::Mutex<HashMap<String, u64>>,
}

impl<A: VenueAdapter> Flusso<A> {
    /// Engine over the real websocket transport with default
    /// configuration.
    pub fn new(adapter: A) -> Self {
        Self::builder(adapter).build()
    }

    /// Start building an engine; see [`FlussoBuilder`].
    pub fn builder(adapter: A) -> FlussoBuilder<A, WsTransport> {
        FlussoBuilder {
            adapter,
            transport: WsTransport::default(),
            config: EngineConfig::default(),
        }
    }
}

impl<A: VenueAdapter, T: Transport> Flusso<A, T> {
    /// Subscribe (deduped by `key`) and await the first update
    /// resolved under `hash`.
    ///
    /// The waiter is registered before the subscribe payload is sent,
    /// so the subscription's first event cannot be missed. If `key` is
    /// already active on the connection the payload is not re-sent and
    /// the call just awaits the next update.
    pub async fn subscribe(
        &self,
        url: &str,
        hash: MessageHash,
        payload: Value,
        key: SubscriptionKey,
    ) -> Result<A::Update, FlussoError> {
        self.watch(url, vec![hash], Some((key, payload))).await
    }

    /// Subscribe once and await whichever of `hashes` resolves first.
    ///
    /// Used for aggregate streams where one venue topic serves several
    /// logical hashes, e.g. awaiting both `orders` and
    /// `orders:PERP_BTC_USDC` off a single private stream.
    pub async fn subscribe_multiple(
        &self,
        url: &str,
        hashes: Vec<MessageHash>,
        payload: Value,
        key: SubscriptionKey,
    ) -> Result<A::Update, FlussoError> {
        if hashes.is_empty() {
            return Err(FlussoError::malformed(
                "subscribe_multiple needs at least one message hash",
            ));
        }
        self.watch(url, hashes, Some((key, payload))).await
    }

    /// Await `hash` on an existing (or newly opened) connection
    /// without sending anything.
    pub async fn wait_for(&self, url: &str, hash: MessageHash) -> Result<A::Update, FlussoError> {
        self.watch(url, vec![hash], None).await
    }

    /// Send an authentication payload and await its confirmation.
    ///
    /// The subscription key doubles as the message hash, so a repeated
    /// call while authenticated awaits the existing confirmation
    /// rather than re-sending, and an auth failure that clears the
    /// subscription makes the next call re-send.
    pub async fn authenticate(
        &self,
        url: &str,
        hash: MessageHash,
        payload: Value,
    ) -> Result<A::Update, FlussoError> {
        let key = SubscriptionKey::new(hash.as_str());
        self.watch(url, vec![hash], Some((key, payload))).await
    }

    /// Next request id for `url`: a monotonically increasing counter
    /// per URL, starting at 1.
    pub fn request_id(&self, url: &str) -> u64 {
        let mut ids = self
            .request_ids
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = ids.entry(url.to_string()).or_insert(0);
        *id += 1;
        *id
    }

    /// Close the connection for `url`, rejecting its pending futures
    /// with a cancellation error. No-op when no connection exists.
    pub async fn close(&self, url: &str) {
        let handle = self.pool.lock().await.remove(url);
        if let Some(handle) = handle {
            handle.close().await;
        }
    }

    /// Close every pooled connection.
    pub async fn close_all(&self) {
        let handles: Vec<_> = self.pool.lock().await.drain().collect();
        for (_, handle) in handles {
            handle.close().await;
        }
    }

    /// The adapter this engine wraps.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    async fn watch(
        &self,
        url: &str,
        hashes: Vec<MessageHash>,
        subscription: Option<(SubscriptionKey, Value)>,
    ) -> Result<A::Update, FlussoError> {
        let handle = self.handle_for(url).await?;
        handle.watch(hashes, subscription).await
    }

    /// Get or create the connection for `url`. The pool lock is held
    /// across connect so concurrent first subscribers share one socket.
    async fn handle_for(&self, url: &str) -> Result<ConnectionHandle<A>, FlussoError> {
        let mut pool = self.pool.lock().await;
        if let Some(handle) = pool.get(url) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
            pool.remove(url);
        }
        let stream = self.transport.connect(url).await?;
        let handle = Connection::spawn(
            url.to_string(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.transport),
            self.config.clone(),
            stream,
        );
        pool.insert(url.to_string(), handle.clone());
        Ok(handle)
    }
}

/// Builder for [`Flusso`]; configures keep-alive, reconnect, and the
/// transport seam.
pub struct FlussoBuilder<A: VenueAdapter, T: Transport> {
    adapter: A,
    transport: T,
    config: EngineConfig,
}

impl<A: VenueAdapter, T: Transport> FlussoBuilder<A, T> {
    /// Override the keep-alive settings.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Swap the transport, e.g. for an in-memory one in tests.
    #[must_use]
    pub fn transport<T2: Transport>(self, transport: T2) -> FlussoBuilder<A, T2> {
        FlussoBuilder {
            adapter: self.adapter,
            transport,
            config: self.config,
        }
    }

    /// Finish building the engine.
    #[must_use]
    pub fn build(self) -> Flusso<A, T> {
        Flusso {
            adapter: Arc::new(self.adapter),
            transport: Arc::new(self.transport),
            config: self.config,
            pool: Mutex::new(HashMap::new()),
            request_ids: std::sync::Mutex::new(HashMap::new()),
        }
    }
}
