//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

/// Normalization failures. All are validation errors: replaying the same
/// envelope cannot succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// A required payload field is absent.
    #[error("{kind}: missing field '{field}'")]
    MissingField {
        /// Event name
        kind: String,
        /// Field name
        field: String,
    },

    /// A payload field has the wrong shape.
    #[error("{kind}: invalid field '{field}': {reason}")]
    InvalidField {
        /// Event name
        kind: String,
        /// Field name
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Neither the payload nor the envelope carries a usable timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl NormalizeError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
