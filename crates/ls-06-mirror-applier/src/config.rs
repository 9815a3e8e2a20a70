//! # Applier Configuration

use serde::{Deserialize, Serialize};

/// Default capacity of the in-memory processed-event cache.
pub const DEFAULT_EVENT_CACHE_SIZE: usize = 1000;

/// Default failed attempts before an event is dead-lettered.
pub const DEFAULT_MAX_EVENT_RETRIES: u32 = 3;

/// Configuration for the mirror applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplierConfig {
    /// Recently applied event ids kept in memory.
    pub event_cache_size: usize,
    /// Failed attempts before a retryable failure is dead-lettered.
    pub max_event_retries: u32,
    /// Immediate re-runs of a handler after an optimistic-concurrency conflict.
    pub conflict_retries: u32,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            event_cache_size: DEFAULT_EVENT_CACHE_SIZE,
            max_event_retries: DEFAULT_MAX_EVENT_RETRIES,
            conflict_retries: 3,
        }
    }
}

impl ApplierConfig {
    /// Small cache and a short retry budget.
    pub fn for_testing() -> Self {
        Self {
            event_cache_size: 16,
            max_event_retries: 2,
            conflict_retries: 2,
        }
    }
}
