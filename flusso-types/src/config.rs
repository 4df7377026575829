//! Configuration types shared between the engine facade and the
//! per-connection actors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff configuration for reconnecting streaming
/// sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Keep-alive settings for a persistent connection.
///
/// A ping is sent after each idle `ping_interval`; a connection that
/// has seen no inbound traffic for `timeout_multiple` consecutive
/// intervals is treated as dead and torn down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Interval between keep-alive pings.
    pub ping_interval: Duration,
    /// Number of silent intervals after which the peer is declared dead.
    pub timeout_multiple: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(10),
            timeout_multiple: 3,
        }
    }
}

/// Reconnection policy applied after an unexpected disconnect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Whether to reconnect and resubscribe automatically.
    pub enabled: bool,
    /// Give up after this many consecutive failed attempts
    /// (`None` retries indefinitely).
    pub max_attempts: Option<u32>,
    /// Delay schedule between attempts.
    pub backoff: BackoffConfig,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: None,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Aggregate engine configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Keep-alive settings applied to every connection.
    pub keep_alive: KeepAliveConfig,
    /// Reconnect policy applied to every connection.
    pub reconnect: ReconnectPolicy,
}
