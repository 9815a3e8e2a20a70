//! # Inbound Ports
//!
//! The API the ingestor and resync controller drive.

use async_trait::async_trait;
use ls_01_chain_client::RawEvent;

use crate::domain::{ApplyError, ApplyOutcome};

/// Applies raw chain events to the mirror.
///
/// `apply` never fails as a call: per-event failures come back as
/// [`ApplyOutcome::Failed`] or [`ApplyOutcome::DeadLettered`] so callers
/// can move on to the next event.
#[async_trait]
pub trait EventApplier: Send + Sync {
    /// Dedupe, normalize and apply one envelope.
    async fn apply(&self, raw: &RawEvent) -> ApplyOutcome;

    /// Whether an event key is in the processed log.
    async fn is_processed(&self, event_key: &str) -> Result<bool, ApplyError>;

    /// Events applied by this instance since start.
    fn applied_count(&self) -> u64;
}
