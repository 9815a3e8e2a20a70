//! # Ingestor Errors

use ls_01_chain_client::ChainClientError;
use ls_07_resync::ResyncError;
use shared_types::ErrorKind;
use thiserror::Error;

/// Ingestor errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestorError {
    /// `start` was called while the supervisor is running.
    #[error("Event ingestor is already running")]
    AlreadyRunning,

    /// Reconnects failed `attempts` times in a row.
    #[error("Reconnection budget exhausted after {attempts} attempts: {last_error}")]
    ReconnectBudgetExhausted {
        /// Attempts made
        attempts: u32,
        /// Cause of the last failure
        last_error: String,
    },

    /// Opening or holding the subscription failed.
    #[error("Subscription failed: {0}")]
    Subscription(#[from] ChainClientError),

    /// Catch-up after a reconnect failed.
    #[error("Catch-up resync failed: {0}")]
    Resync(#[from] ResyncError),

    /// The live buffer filled up.
    #[error("Live buffer overflowed at {capacity} events")]
    BufferOverflow {
        /// Configured capacity
        capacity: usize,
    },

    /// The health probe failed after a quiet period.
    #[error("Health probe failed after {idle_ms}ms without events: {error}")]
    Unhealthy {
        /// Quiet period observed
        idle_ms: u64,
        /// Probe failure
        error: String,
    },
}

impl IngestorError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestorError::AlreadyRunning => ErrorKind::Conflict,
            IngestorError::ReconnectBudgetExhausted { .. } => ErrorKind::Fatal,
            IngestorError::Subscription(e) => e.kind(),
            IngestorError::Resync(e) => e.kind(),
            IngestorError::BufferOverflow { .. } | IngestorError::Unhealthy { .. } => {
                ErrorKind::Network
            }
        }
    }

    /// Whether the supervisor must stop instead of reconnecting.
    pub fn is_terminal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
