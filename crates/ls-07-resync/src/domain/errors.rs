//! # Resync Errors

use ls_01_chain_client::ChainClientError;
use ls_03_mirror_store::StoreError;
use shared_types::ErrorKind;
use thiserror::Error;

/// Errors that abort a resync run.
///
/// Per-event failures do not abort; they are counted in the report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResyncError {
    /// Window outside the accepted range.
    #[error("Resync window must be between {min} and {max} hours, got {hours}")]
    InvalidWindow {
        /// Requested hours
        hours: u32,
        /// Lower bound
        min: u32,
        /// Upper bound
        max: u32,
    },

    /// Event query failed.
    #[error("Event query failed: {0}")]
    Chain(#[from] ChainClientError),

    /// Mirror read failed.
    #[error("Mirror read failed: {0}")]
    Store(#[from] StoreError),
}

impl ResyncError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResyncError::InvalidWindow { .. } => ErrorKind::Validation,
            ResyncError::Chain(e) => e.kind(),
            ResyncError::Store(e) => e.kind(),
        }
    }
}
