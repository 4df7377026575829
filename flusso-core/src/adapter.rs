//! The contract between the venue-agnostic engine and per-venue
//! adapter code.
//!
//! An adapter supplies URL/topic construction and payload parsing; the
//! engine supplies connection multiplexing, subscription bookkeeping,
//! future resolution, and keep-alive. The two meet here: the adapter
//! registers a fixed [`DispatchTable`] once, and the engine invokes the
//! matched handler for every inbound frame, on the connection's own
//! dispatch task, with exclusive access to the adapter's per-connection
//! state.

use std::collections::HashMap;

use serde_json::Value;

use crate::FlussoError;
use flusso_types::{Envelope, MessageHash, RoutingKey, SubscriptionKey};

/// What a handler may do while running on the dispatch loop.
///
/// Resolution is broadcast: every waiter currently registered under the
/// hash is woken with a clone of the value. Resolving a hash nobody
/// awaits is a harmless no-op, consistent with the subscribe-then-await
/// protocol.
pub trait HandlerCx<U> {
    /// URL of the connection this frame arrived on.
    fn url(&self) -> &str;

    /// Wake every waiter registered under `hash` with `value`.
    fn resolve(&mut self, hash: &MessageHash, value: U);

    /// Reject every waiter registered under `hash` with `error`.
    fn reject(&mut self, hash: &MessageHash, error: FlussoError);
}

/// An inbound-frame handler.
///
/// Plain function pointers keep the dispatch table a closed, fixed
/// mapping: every route an adapter serves is named at registration
/// time, and anything else lands in the engine's explicit unhandled
/// branch.
pub type Handler<A> = fn(
    &A,
    &mut dyn HandlerCx<<A as VenueAdapter>::Update>,
    &mut <A as VenueAdapter>::State,
    Envelope,
) -> Result<(), FlussoError>;

/// Fixed routing-key → handler table, built once at adapter
/// registration.
pub struct DispatchTable<A: VenueAdapter> {
    entries: HashMap<&'static str, Handler<A>>,
}

impl<A: VenueAdapter> DispatchTable<A> {
    /// Build the table from `(routing key, handler)` pairs.
    #[must_use]
    pub fn from_entries(entries: &[(&'static str, Handler<A>)]) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
        }
    }

    /// Try each candidate in order and return the first handler hit.
    #[must_use]
    pub fn lookup(&self, candidates: &[RoutingKey]) -> Option<(RoutingKey, Handler<A>)> {
        for candidate in candidates {
            if let Some(handler) = self.entries.get(candidate.name()) {
                return Some((candidate.clone(), *handler));
            }
        }
        None
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a `success:false` envelope maps onto pending futures.
pub struct ErrorRouting {
    /// The classified error delivered to the rejected waiters.
    pub error: FlussoError,
    /// Message hashes to reject with the error.
    pub reject: Vec<MessageHash>,
    /// Subscription entry to clear so that a retry re-sends, used for
    /// authentication failures.
    pub clear_subscription: Option<SubscriptionKey>,
}

/// A venue adapter: the only per-venue code the engine knows about.
pub trait VenueAdapter: Send + Sync + Sized + 'static {
    /// Value type futures resolve with (typically an adapter-defined
    /// enum over normalized records).
    type Update: Clone + Send + 'static;

    /// Per-connection mutable state (caches, order books). Owned by
    /// the connection's dispatch task and handed to handlers by
    /// `&mut`; never shared across connections.
    type State: Default + Send + 'static;

    /// Adapter name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// The fixed dispatch table, built once when the adapter is
    /// registered with the engine.
    fn dispatch_table(&self) -> DispatchTable<Self>;

    /// Keep-alive ping payload, sent on each idle interval.
    /// `None` disables application-level pings.
    fn ping(&self) -> Option<Value> {
        serde_json::to_value(Envelope::control("ping")).ok()
    }

    /// Classify a `success:false` envelope before normal dispatch.
    ///
    /// The default treats it as a venue protocol error rejected
    /// against the envelope's topic. Adapters override this to
    /// recognize venue-specific messages, e.g. mapping
    /// "Auth is needed." onto [`FlussoError::Authentication`] and the
    /// `authenticated` hash.
    fn classify_error(&self, envelope: &Envelope) -> ErrorRouting {
        let message = envelope
            .error_msg
            .clone()
            .unwrap_or_else(|| "request failed".to_string());
        let reject = envelope
            .topic
            .as_deref()
            .map(MessageHash::from)
            .into_iter()
            .collect();
        ErrorRouting {
            error: FlussoError::protocol(self.name(), message),
            reject,
            clear_subscription: None,
        }
    }
}
