//! # Ingestor Control
//!
//! Start/stop of the live ingestor and on-demand resyncs.

use std::sync::Arc;

use tracing::info;

use shared_types::EventId;

use ls_05_event_ingestor::{EventIngestorApi, IngestorStatus};
use ls_07_resync::{ResyncApi, ResyncReport};

use crate::errors::ServiceError;

/// Operator surface over the ingestor and the resync controller.
pub struct IngestorControl {
    ingestor: Arc<dyn EventIngestorApi>,
    resync: Arc<dyn ResyncApi>,
}

impl IngestorControl {
    /// Create the control surface.
    pub fn new(ingestor: Arc<dyn EventIngestorApi>, resync: Arc<dyn ResyncApi>) -> Self {
        Self { ingestor, resync }
    }

    /// Start the live subscription.
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.ingestor.start_listening().await?;
        Ok(())
    }

    /// Stop the live subscription. In-flight events finish first.
    pub async fn stop(&self) {
        self.ingestor.stop_listening().await;
    }

    /// Current ingestor status.
    pub fn status(&self) -> IngestorStatus {
        self.ingestor.status()
    }

    /// Replay events after `cursor`, or the whole stream when `None`.
    pub async fn sync_from_cursor(&self, cursor: Option<EventId>) -> Result<ResyncReport, ServiceError> {
        let report = self.resync.sync_from_cursor(cursor).await?;
        info!(%report, "Cursor resync finished");
        Ok(report)
    }

    /// Replay events after the mirror's last applied cursor.
    pub async fn sync_from_last_cursor(&self) -> Result<ResyncReport, ServiceError> {
        let report = self.resync.sync_from_last_cursor().await?;
        info!(%report, "Catch-up resync finished");
        Ok(report)
    }

    /// Replay events from the last `hours` hours (1..=168).
    pub async fn sync_recent(&self, hours: u32) -> Result<ResyncReport, ServiceError> {
        let report = self.resync.sync_recent(hours).await?;
        info!(hours, %report, "Window resync finished");
        Ok(report)
    }
}
