//! Per-connection record of active logical subscriptions.
//!
//! The registry deduplicates subscribe sends (the first caller for a
//! key pays the send, later callers just await) and stores each
//! subscription's original payload so a reconnect can replay it.

use serde_json::Value;

use flusso_types::SubscriptionKey;

pub(crate) struct SubscriptionRegistry {
    // Insertion order is kept so replay resends in subscribe order.
    active: Vec<(SubscriptionKey, Value)>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self { active: Vec::new() }
    }

    /// Register `key` if absent. Returns `true` when the caller must
    /// send the subscribe payload, `false` when already subscribed.
    pub(crate) fn subscribe(&mut self, key: SubscriptionKey, payload: Value) -> bool {
        if self.active.iter().any(|(k, _)| *k == key) {
            return false;
        }
        self.active.push((key, payload));
        true
    }

    /// Remove the entry for `key`, if any.
    pub(crate) fn unsubscribe(&mut self, key: &SubscriptionKey) {
        self.active.retain(|(k, _)| k != key);
    }

    /// Drop every entry (connection teardown; no stale resend).
    pub(crate) fn clear(&mut self) {
        self.active.clear();
    }

    /// Stored payloads in subscribe order, for reconnect replay.
    pub(crate) fn replay(&self) -> impl Iterator<Item = &Value> {
        self.active.iter().map(|(_, payload)| payload)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_subscribe_requires_send_repeat_does_not() {
        let mut registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::new("BTC@trade");
        assert!(registry.subscribe(key.clone(), json!({"topic": "BTC@trade"})));
        assert!(!registry.subscribe(key.clone(), json!({"topic": "BTC@trade"})));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unsubscribe_allows_resend() {
        let mut registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::new("authenticated");
        assert!(registry.subscribe(key.clone(), json!({"event": "auth"})));
        registry.unsubscribe(&key);
        assert!(registry.subscribe(key, json!({"event": "auth"})));
    }

    #[test]
    fn replay_preserves_subscribe_order() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(SubscriptionKey::new("a"), json!(1));
        registry.subscribe(SubscriptionKey::new("b"), json!(2));
        registry.subscribe(SubscriptionKey::new("c"), json!(3));
        let replayed: Vec<i64> = registry
            .replay()
            .map(|v| v.as_i64().unwrap_or_default())
            .collect();
        assert_eq!(replayed, vec![1, 2, 3]);
    }
}
