//! Identifier newtypes for subscription bookkeeping and future
//! resolution, plus routing-key derivation for inbound dispatch.

use std::fmt;

use crate::Envelope;

/// Correlation key tying an inbound event to the logical request or
/// subscription awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHash(String);

impl MessageHash {
    /// Build a hash from any string-like key.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Build a `prefix:scope` hash, e.g. `orders:PERP_BTC_USDC`.
    #[must_use]
    pub fn scoped(prefix: &str, scope: &str) -> Self {
        Self(format!("{prefix}:{scope}"))
    }

    /// The underlying key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Stable identifier for an active logical subscription on a
/// connection, derived from the venue topic (and symbol where the
/// topic alone is ambiguous).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Build a key from the venue topic.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The underlying key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A candidate key for dispatch-table lookup, in decreasing
/// specificity.
///
/// An inbound frame yields up to four candidates, tried in order:
/// the exact `event` name, the exact `topic`, the channel name after
/// splitting the topic on `@` (`PERP_BTC_USDC@kline_1m` → `kline_1m`),
/// and the channel base after a secondary split on `_`
/// (`kline_1m` → `kline`). The first candidate present in the
/// adapter's table wins; a frame matching none is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoutingKey {
    /// Exact `event` field match.
    Event(String),
    /// Exact `topic` field match.
    Topic(String),
    /// Channel name extracted from a composite `symbol@channel` topic.
    Channel(String),
    /// Channel base for parameterized channels (`kline_1m` → `kline`).
    ChannelBase(String),
}

impl RoutingKey {
    /// The table-lookup key for this candidate.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Event(s) | Self::Topic(s) | Self::Channel(s) | Self::ChannelBase(s) => s,
        }
    }

    /// Derive the ordered candidate list for an inbound envelope.
    #[must_use]
    pub fn candidates(envelope: &Envelope) -> Vec<Self> {
        let mut out = Vec::with_capacity(4);
        if let Some(event) = envelope.event.as_deref() {
            out.push(Self::Event(event.to_string()));
        }
        if let Some(topic) = envelope.topic.as_deref() {
            out.push(Self::Topic(topic.to_string()));
            if let Some((_, channel)) = topic.split_once('@') {
                out.push(Self::Channel(channel.to_string()));
                if let Some((base, _)) = channel.split_once('_') {
                    out.push(Self::ChannelBase(base.to_string()));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_follow_resolution_order() {
        let env = Envelope {
            topic: Some("PERP_BTC_USDC@kline_1m".to_string()),
            ..Envelope::default()
        };
        let keys = RoutingKey::candidates(&env);
        assert_eq!(
            keys,
            vec![
                RoutingKey::Topic("PERP_BTC_USDC@kline_1m".to_string()),
                RoutingKey::Channel("kline_1m".to_string()),
                RoutingKey::ChannelBase("kline".to_string()),
            ]
        );
    }

    #[test]
    fn event_outranks_topic() {
        let env = Envelope {
            event: Some("auth".to_string()),
            topic: Some("balance".to_string()),
            ..Envelope::default()
        };
        let keys = RoutingKey::candidates(&env);
        assert_eq!(keys[0], RoutingKey::Event("auth".to_string()));
        assert_eq!(keys[1], RoutingKey::Topic("balance".to_string()));
    }

    #[test]
    fn plain_topic_has_no_channel_candidates() {
        let env = Envelope {
            topic: Some("tickers".to_string()),
            ..Envelope::default()
        };
        assert_eq!(
            RoutingKey::candidates(&env),
            vec![RoutingKey::Topic("tickers".to_string())]
        );
    }

    #[test]
    fn scoped_hash_renders_prefix_colon_scope() {
        let hash = MessageHash::scoped("orders", "PERP_BTC_USDC");
        assert_eq!(hash.as_str(), "orders:PERP_BTC_USDC");
    }
}
