//! # Apply Outcomes

use super::errors::ApplyError;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The handler ran and the event is now recorded as processed.
    Applied {
        /// Snake-case event kind
        kind: &'static str,
        /// Whether any mirror entity changed
        changed: bool,
    },
    /// Already processed; nothing was done.
    Duplicate,
    /// Unknown event kind; recorded as processed and otherwise ignored.
    Ignored {
        /// Event name
        name: String,
    },
    /// A dependency was missing on chain; the envelope is parked on its entity.
    Deferred {
        /// Entity key
        entity: String,
    },
    /// The attempt failed; the event stays unprocessed so a later pass can retry.
    Failed {
        /// Cause
        error: ApplyError,
        /// Failed attempts so far
        attempts: u32,
    },
    /// Moved to the dead-letter table after failing for good.
    DeadLettered {
        /// Last cause
        error: ApplyError,
    },
}

impl ApplyOutcome {
    /// Whether the event is now in the processed log.
    pub fn is_processed(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Applied { .. }
                | ApplyOutcome::Duplicate
                | ApplyOutcome::Ignored { .. }
                | ApplyOutcome::DeadLettered { .. }
        )
    }

    /// Whether the mirror cursor may move past this event.
    pub fn settles_cursor(&self) -> bool {
        !matches!(self, ApplyOutcome::Failed { .. })
    }
}
