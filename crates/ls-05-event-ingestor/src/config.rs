//! # Ingestor Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quiet period before the health check probes the chain (5 min).
pub const DEFAULT_IDLE_WINDOW_MS: u64 = 300_000;

/// Default health check period.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

/// Default base reconnect delay.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Default reconnect budget.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default size of the recently-seen event id cache.
pub const DEFAULT_EVENT_CACHE_SIZE: usize = 1000;

/// Default live buffer between the subscription and the applier.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Configuration for the event ingestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestorConfig {
    /// Quiet period after which the chain is probed.
    pub idle_window_ms: u64,
    /// How often the health check looks at the quiet period.
    pub health_check_interval_ms: u64,
    /// Base reconnect delay; attempt `n` waits `n` times this.
    pub reconnect_delay_ms: u64,
    /// Failed reconnects before the ingestor stops for good.
    pub max_reconnect_attempts: u32,
    /// Recently seen event ids kept for deduplication.
    pub event_cache_size: usize,
    /// Events buffered ahead of the applier before the subscription is dropped.
    pub buffer_capacity: usize,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            idle_window_ms: DEFAULT_IDLE_WINDOW_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            event_cache_size: DEFAULT_EVENT_CACHE_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl IngestorConfig {
    /// Short timers and a small budget, for paused-clock tests.
    pub fn for_testing() -> Self {
        Self {
            idle_window_ms: 1_000,
            health_check_interval_ms: 100,
            reconnect_delay_ms: 50,
            max_reconnect_attempts: 3,
            event_cache_size: 64,
            buffer_capacity: 128,
        }
    }

    /// Quiet period as a duration.
    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    /// Health check period as a duration (at least 1 ms).
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }

    /// Wait before reconnect attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestorConfig::default();
        assert_eq!(config.idle_window_ms, 300_000);
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.event_cache_size, 1_000);
        assert_eq!(config.buffer_capacity, 10_000);
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        let config = IngestorConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(5));
        assert_eq!(config.backoff(3), Duration::from_secs(15));
    }
}
