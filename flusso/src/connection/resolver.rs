//! Per-connection message-hash future resolution.
//!
//! Callers register waiters against one or more hashes; handlers
//! resolve or reject a hash, waking every waiter registered under it
//! with a clone of the outcome. A waiter registered under several
//! hashes (multi-hash wait) is consumed by whichever hash fires first,
//! so each registration observes at most one resolution. Resolving a
//! hash with no pending waiter is a harmless no-op: with the
//! subscribe-then-await protocol, the waiter is always registered
//! before the subscribe payload leaves the socket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use flusso_core::FlussoError;
use flusso_types::MessageHash;

type Outcome<U> = Result<U, FlussoError>;

/// A single registration's send side; shared between all hashes it is
/// registered under, consumed by the first resolution.
struct Waiter<U> {
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome<U>>>>>,
}

impl<U> Waiter<U> {
    fn complete(&self, outcome: Outcome<U>) {
        let taken = self.tx.lock().map(|mut slot| slot.take()).unwrap_or(None);
        if let Some(tx) = taken {
            // The caller may have gone away; dropped receivers are fine.
            let _ = tx.send(outcome);
        }
    }
}

/// Pending waiters keyed by message hash.
pub(crate) struct FutureResolver<U> {
    waiters: HashMap<MessageHash, Vec<Waiter<U>>>,
}

impl<U: Clone> FutureResolver<U> {
    pub(crate) fn new() -> Self {
        Self {
            waiters: HashMap::new(),
        }
    }

    /// Register `reply` as a waiter under every hash in `hashes`; the
    /// first hash to resolve consumes it.
    pub(crate) fn register(&mut self, hashes: &[MessageHash], reply: oneshot::Sender<Outcome<U>>) {
        let tx = Arc::new(Mutex::new(Some(reply)));
        for hash in hashes {
            self.waiters
                .entry(hash.clone())
                .or_default()
                .push(Waiter { tx: Arc::clone(&tx) });
        }
    }

    /// Wake every waiter registered under `hash` with `value`.
    pub(crate) fn resolve(&mut self, hash: &MessageHash, value: U) {
        if let Some(waiters) = self.waiters.remove(hash) {
            for waiter in waiters {
                waiter.complete(Ok(value.clone()));
            }
        }
    }

    /// Reject every waiter registered under `hash` with `error`.
    pub(crate) fn reject(&mut self, hash: &MessageHash, error: FlussoError) {
        if let Some(waiters) = self.waiters.remove(hash) {
            for waiter in waiters {
                waiter.complete(Err(error.clone()));
            }
        }
    }

    /// Reject every pending waiter; used on teardown so each waiter
    /// observes exactly one rejection.
    pub(crate) fn reject_all(&mut self, error: &FlussoError) {
        for (_, waiters) in self.waiters.drain() {
            for waiter in waiters {
                waiter.complete(Err(error.clone()));
            }
        }
    }

    /// Number of hashes with at least one registration.
    #[cfg(test)]
    pub(crate) fn pending_hashes(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_wakes_all_waiters_with_same_value() {
        let mut resolver: FutureResolver<u32> = FutureResolver::new();
        let hash = MessageHash::new("trades");
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        resolver.register(std::slice::from_ref(&hash), tx1);
        resolver.register(std::slice::from_ref(&hash), tx2);
        resolver.resolve(&hash, 7);
        assert_eq!(rx1.await.unwrap().unwrap(), 7);
        assert_eq!(rx2.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn multi_hash_waiter_is_consumed_once() {
        let mut resolver: FutureResolver<u32> = FutureResolver::new();
        let per_symbol = MessageHash::new("orders:BTC");
        let aggregate = MessageHash::new("orders");
        let (tx, rx) = oneshot::channel();
        resolver.register(&[per_symbol.clone(), aggregate.clone()], tx);

        resolver.resolve(&aggregate, 1);
        assert_eq!(rx.await.unwrap().unwrap(), 1);

        // The per-symbol entry still exists but its waiter is spent;
        // resolving it must not panic or deliver twice.
        resolver.resolve(&per_symbol, 2);
    }

    #[tokio::test]
    async fn resolve_without_waiter_is_noop() {
        let mut resolver: FutureResolver<u32> = FutureResolver::new();
        resolver.resolve(&MessageHash::new("nobody"), 1);
        assert_eq!(resolver.pending_hashes(), 0);
    }

    #[tokio::test]
    async fn reject_all_rejects_each_waiter_exactly_once() {
        let mut resolver: FutureResolver<u32> = FutureResolver::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        resolver.register(&[MessageHash::new("a")], tx1);
        resolver.register(&[MessageHash::new("b")], tx2);
        resolver.reject_all(&FlussoError::cancelled("closing"));
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
        assert_eq!(resolver.pending_hashes(), 0);
    }
}
