use thiserror::Error;

/// Unified error type for the flusso workspace.
///
/// Broadcast rejection hands the same error to every pending waiter on
/// a connection, so the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlussoError {
    /// Socket closed, unreachable, or keep-alive declared the peer dead.
    /// Triggers reconnect-and-resubscribe when the policy allows it.
    #[error("connectivity: {0}")]
    Connectivity(String),

    /// The venue rejected authentication. Only the authentication
    /// future is rejected, and its subscription entry is cleared so a
    /// retry can re-send.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The venue answered a request with `success:false`.
    #[error("{venue} protocol error: {message}")]
    Protocol {
        /// Venue or adapter name for context.
        venue: String,
        /// The venue-supplied error message.
        message: String,
    },

    /// A sequence gap was detected in an order book; the book is
    /// marked stale and a fresh snapshot is required.
    #[error("order book for {symbol} is stale, resnapshot required")]
    Stale {
        /// Symbol of the affected book.
        symbol: String,
    },

    /// An inbound frame could not be parsed. Dropped, never fatal.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The connection (or the whole pool) was closed while the request
    /// was pending.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The adapter does not implement the requested behavior.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl FlussoError {
    /// Helper: build a `Connectivity` error.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Helper: build an `Authentication` error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Helper: build a `Protocol` error tagged with the venue name.
    pub fn protocol(venue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            venue: venue.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `Stale` error for a symbol's book.
    pub fn stale(symbol: impl Into<String>) -> Self {
        Self::Stale {
            symbol: symbol.into(),
        }
    }

    /// Helper: build a `Malformed` error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Helper: build a `Cancelled` error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// `true` for errors that tear the connection down and are
    /// eligible for automatic reconnection.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}
