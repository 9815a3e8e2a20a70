//! # Inbound Ports
//!
//! Catch-up API driven by the ingestor and the operator CLI.

use async_trait::async_trait;
use shared_types::EventId;

use crate::domain::{ResyncError, ResyncReport};

/// Resync controller API.
#[async_trait]
pub trait ResyncApi: Send + Sync {
    /// Replay every event after `cursor` in chain order. `None` starts at
    /// the first event of the stream.
    async fn sync_from_cursor(&self, cursor: Option<EventId>) -> Result<ResyncReport, ResyncError>;

    /// Replay from the mirror's recorded high-water cursor.
    async fn sync_from_last_cursor(&self) -> Result<ResyncReport, ResyncError>;

    /// Replay every event stamped within the last `hours` hours.
    async fn sync_recent(&self, hours: u32) -> Result<ResyncReport, ResyncError>;
}
