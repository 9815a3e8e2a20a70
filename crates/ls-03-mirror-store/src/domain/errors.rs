//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

/// Key-value backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// Backend I/O failure.
    #[error("I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },
}

/// Mirror store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Unique-key or version violation.
    #[error("Conflict on {entity} {key}: {reason}")]
    Conflict {
        /// Entity table
        entity: &'static str,
        /// Entity key
        key: String,
        /// What collided
        reason: String,
    },

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(#[from] KVStoreError),

    /// A stored value could not be decoded.
    #[error("Corrupt record at {key}: {reason}")]
    Codec {
        /// Storage key
        key: String,
        /// Decoder message
        reason: String,
    },

    /// An entity violates a mirror invariant.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl StoreError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Backend(_) => ErrorKind::Network,
            StoreError::Codec { .. } => ErrorKind::Fatal,
            StoreError::Invariant(_) => ErrorKind::Validation,
        }
    }
}
