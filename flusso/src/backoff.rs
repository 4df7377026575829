//! Reconnect delay schedule: exponential growth with random jitter.

use flusso_types::BackoffConfig;
use rand::Rng;

/// Add up to `jitter_percent` percent of random jitter on top of
/// `base_ms`. Jitter spreads simultaneous reconnect attempts apart.
pub(crate) fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

/// Mutable exponential schedule over a [`BackoffConfig`].
#[derive(Debug, Clone)]
pub(crate) struct BackoffSchedule {
    config: BackoffConfig,
    current_ms: u64,
}

impl BackoffSchedule {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            current_ms: config.min_backoff_ms,
            config,
        }
    }

    /// The jittered delay to wait before the next attempt; advances
    /// the schedule.
    pub(crate) fn next_wait_ms(&mut self) -> u64 {
        let base = self.current_ms;
        self.current_ms = std::cmp::min(
            self.config.max_backoff_ms,
            base.saturating_mul(u64::from(self.config.factor.max(1))),
        );
        jitter_wait(base, u32::from(self.config.jitter_percent.min(100)))
    }

    /// Reset after a successful session.
    pub(crate) fn reset(&mut self) {
        self.current_ms = self.config.min_backoff_ms;
    }
}
