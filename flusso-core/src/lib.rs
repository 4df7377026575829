//! flusso-core
//!
//! Venue-agnostic building blocks shared by the flusso engine and its
//! venue adapters.
//!
//! - `error`: the unified [`FlussoError`] type.
//! - `adapter`: the [`VenueAdapter`] contract and the fixed dispatch
//!   table inbound frames are routed through.
//! - `cache`: the bounded, order-preserving cache family adapters
//!   accumulate trades/orders/candles/positions into.
//! - `orderbook`: the snapshot-then-delta order-book synchronizer.
//! - `transport`: the async transport seam the engine drives; tests
//!   substitute an in-memory implementation.
//!
//! All cache and order-book state is owned by a single connection's
//! dispatch task and mutated only from handler callbacks running on
//! that task, so none of these types carry locks.
#![warn(missing_docs)]

/// The `VenueAdapter` contract and dispatch-table types.
pub mod adapter;
/// Bounded, order-preserving caches for normalized records.
pub mod cache;
mod error;
/// Live order books built from snapshots plus deltas.
pub mod orderbook;
/// Async transport traits implemented by websocket and mock backends.
pub mod transport;

pub use adapter::{DispatchTable, ErrorRouting, Handler, HandlerCx, VenueAdapter};
pub use cache::{
    ArrayCache, ArrayCacheBySymbolById, ArrayCacheBySymbolBySide, ArrayCacheByTimestamp, IdKeyed,
    Sided, SymbolKeyed, Timestamped,
};
pub use error::FlussoError;
pub use orderbook::{BookDelta, BookLevels, BookSnapshot, DeltaOp, OrderBook, PriceLevel, Side};
pub use transport::{Transport, TransportStream};
