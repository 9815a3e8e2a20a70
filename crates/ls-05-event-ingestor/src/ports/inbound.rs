//! # Inbound Ports

use async_trait::async_trait;

use crate::domain::{IngestorError, IngestorState, IngestorStatus};

/// Control surface of the event ingestor.
#[async_trait]
pub trait EventIngestorApi: Send + Sync {
    /// Start the supervisor. Fails if it is already running.
    async fn start_listening(&self) -> Result<(), IngestorError>;

    /// Stop the supervisor and wait until the subscription is released and
    /// buffered events are applied. A no-op when already stopped.
    async fn stop_listening(&self);

    /// Current status.
    fn status(&self) -> IngestorStatus;

    /// Current state.
    fn state(&self) -> IngestorState {
        self.status().state
    }

    /// The error that stopped the supervisor, if it stopped on its own.
    fn last_error(&self) -> Option<IngestorError>;
}
