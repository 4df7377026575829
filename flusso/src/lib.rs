//! Flusso multiplexes logical market-data subscriptions onto a small
//! number of persistent connections.
//!
//! Overview
//! - One connection per distinct URL, created lazily and reused for
//!   repeated subscriptions; creation is serialized so concurrent
//!   first-subscribes never open two sockets.
//! - Each connection runs a single dispatch task that exclusively owns
//!   the socket, the subscription registry, the pending-future table,
//!   and the adapter's per-connection state, so none of that state is
//!   locked or shared.
//! - Callers await message hashes; inbound frames are routed through
//!   the adapter's fixed dispatch table, whose handlers normalize the
//!   payload into caches/order books and resolve the awaiting hashes.
//! - Keep-alive pings run on an idle interval; a peer silent for the
//!   configured multiple of that interval is torn down, pending
//!   futures are rejected, and the connection reconnects with
//!   exponential backoff and full resubscription replay.
//!
//! The venue-specific half (URLs, topics, payload parsing) lives
//! behind [`flusso_core::VenueAdapter`]; see `flusso-mock` for a
//! reference adapter and an in-memory transport used by the tests.
//!
//! ```rust,ignore
//! let engine = Flusso::builder(MyVenue::new()).build();
//! let update = engine
//!     .subscribe(
//!         "wss://ws.example.org/stream",
//!         MessageHash::new("PERP_BTC_USDC@trade"),
//!         serde_json::json!({"event": "subscribe", "topic": "PERP_BTC_USDC@trade"}),
//!         SubscriptionKey::new("PERP_BTC_USDC@trade"),
//!     )
//!     .await?;
//! ```
#![warn(missing_docs)]

mod backoff;
mod connection;
pub(crate) mod core;
/// Websocket implementation of the transport seam.
pub mod transport;

pub use core::{Flusso, FlussoBuilder};

pub use flusso_core::{
    ArrayCache, ArrayCacheBySymbolById, ArrayCacheBySymbolBySide, ArrayCacheByTimestamp,
    BookDelta, BookLevels, BookSnapshot, DeltaOp, DispatchTable, ErrorRouting, FlussoError,
    Handler, HandlerCx, OrderBook, PriceLevel, Side, Transport, TransportStream, VenueAdapter,
};
pub use flusso_types::{
    BackoffConfig, EngineConfig, Envelope, KeepAliveConfig, MessageHash, ReconnectPolicy,
    RoutingKey, SubscriptionKey,
};
pub use transport::WsTransport;
