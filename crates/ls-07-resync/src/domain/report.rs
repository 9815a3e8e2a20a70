//! # Resync Report

use ls_06_mirror_applier::ApplyOutcome;
use serde::{Deserialize, Serialize};
use shared_types::EventId;
use std::fmt;

/// Which catch-up path ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncMode {
    /// Ascending from a cursor.
    Cursor,
    /// Everything within the last N hours.
    Recent,
}

impl ResyncMode {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            ResyncMode::Cursor => "cursor",
            ResyncMode::Recent => "recent",
        }
    }
}

/// Counts from one resync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncReport {
    /// Path taken.
    pub mode: ResyncMode,
    /// Events read from the chain.
    pub scanned: u64,
    /// Events applied (including no-op applications).
    pub applied: u64,
    /// Events already processed.
    pub duplicates: u64,
    /// Unknown kinds.
    pub ignored: u64,
    /// Events parked on a missing entity.
    pub deferred: u64,
    /// Events that failed and stay unprocessed.
    pub failed: u64,
    /// Events moved to dead letters.
    pub dead_lettered: u64,
    /// Last event read, if any.
    pub last_event: Option<EventId>,
}

impl ResyncReport {
    /// Empty report.
    pub fn new(mode: ResyncMode) -> Self {
        Self {
            mode,
            scanned: 0,
            applied: 0,
            duplicates: 0,
            ignored: 0,
            deferred: 0,
            failed: 0,
            dead_lettered: 0,
            last_event: None,
        }
    }

    /// Count one outcome.
    pub fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied { .. } => self.applied += 1,
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Ignored { .. } => self.ignored += 1,
            ApplyOutcome::Deferred { .. } => self.deferred += 1,
            ApplyOutcome::Failed { .. } => self.failed += 1,
            ApplyOutcome::DeadLettered { .. } => self.dead_lettered += 1,
        }
    }
}

impl fmt::Display for ResyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resync: scanned={} applied={} duplicates={} ignored={} deferred={} failed={} dead_lettered={}",
            self.mode.as_str(),
            self.scanned,
            self.applied,
            self.duplicates,
            self.ignored,
            self.deferred,
            self.failed,
            self.dead_lettered
        )
    }
}
