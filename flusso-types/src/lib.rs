//! Flusso-specific wire and configuration primitives shared across the engine.
#![warn(missing_docs)]

mod config;
mod envelope;
mod keys;

pub use config::{BackoffConfig, EngineConfig, KeepAliveConfig, ReconnectPolicy};
pub use envelope::Envelope;
pub use keys::{MessageHash, RoutingKey, SubscriptionKey};
