//! # Resync Configuration

use serde::{Deserialize, Serialize};

/// Default page size for event queries.
pub const DEFAULT_RESYNC_PAGE_LIMIT: usize = 1000;

/// Shortest accepted recent-window, in hours.
pub const MIN_WINDOW_HOURS: u32 = 1;

/// Longest accepted recent-window, in hours (one week).
pub const MAX_WINDOW_HOURS: u32 = 168;

/// Configuration for the resync controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncConfig {
    /// Events requested per `queryEvents` page.
    pub page_limit: usize,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_RESYNC_PAGE_LIMIT,
        }
    }
}

impl ResyncConfig {
    /// Tiny pages so tests cross page boundaries.
    pub fn for_testing() -> Self {
        Self { page_limit: 3 }
    }
}
