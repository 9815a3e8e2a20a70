//! # Ingestor State Machine
//!
//! ```text
//! Stopped ─start─► Subscribing ─ok─► Live
//!    ▲                 ▲   │fail      │ transport error, failed probe,
//!    │                 │   ▼          │ buffer overflow
//!    │                 └─ Reconnecting ◄┘
//!    │                         │ budget exhausted
//!    └─────────────────────────┘ (also: stop from any state)
//! ```

use serde::{Deserialize, Serialize};
use shared_types::TimestampMs;
use std::fmt;

/// Ingestor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestorState {
    /// Not running. Initial and terminal.
    Stopped,
    /// Opening the subscription and catching up.
    Subscribing,
    /// Receiving live events.
    Live,
    /// Waiting out a backoff before resubscribing.
    Reconnecting,
}

impl IngestorState {
    /// Snake-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            IngestorState::Stopped => "stopped",
            IngestorState::Subscribing => "subscribing",
            IngestorState::Live => "live",
            IngestorState::Reconnecting => "reconnecting",
        }
    }

    /// Value reported on the state gauge.
    pub fn gauge_value(self) -> f64 {
        match self {
            IngestorState::Stopped => 0.0,
            IngestorState::Subscribing => 1.0,
            IngestorState::Live => 2.0,
            IngestorState::Reconnecting => 3.0,
        }
    }

    /// Whether the supervisor is running in this state.
    pub fn is_running(self) -> bool {
        self != IngestorState::Stopped
    }
}

impl fmt::Display for IngestorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `getEventListenerStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestorStatus {
    /// Current state.
    pub state: IngestorState,
    /// Reconnect attempts since the last successful subscription.
    pub attempt_count: u32,
    /// Wall-clock time the last live event arrived.
    pub last_event_timestamp: Option<TimestampMs>,
    /// Events applied through this ingestor.
    pub processed_count: u64,
}
