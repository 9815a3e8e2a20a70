//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

/// Transaction build failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Address or object id could not be canonicalized.
    #[error("Invalid address in '{field}': {reason}")]
    InvalidAddress {
        /// Input field
        field: &'static str,
        /// Parser message
        reason: String,
    },

    /// A hex field is malformed.
    #[error("Invalid hex in '{field}'")]
    InvalidHex {
        /// Input field
        field: &'static str,
    },

    /// A required string is empty.
    #[error("Field '{0}' must not be empty")]
    Empty(&'static str),

    /// A string exceeds its bound.
    #[error("Field '{field}' is {len} chars, max {max}")]
    TooLong {
        /// Input field
        field: &'static str,
        /// Bound
        max: usize,
        /// Actual length
        len: usize,
    },

    /// A numeric field is out of range.
    #[error("Field '{field}' out of range: {reason}")]
    OutOfRange {
        /// Input field
        field: &'static str,
        /// Why
        reason: String,
    },

    /// Alert proposals are created by the contract only.
    #[error("Alert proposals cannot be created directly")]
    AlertNotUserCreatable,

    /// Proposal type code is not recognized.
    #[error("Unknown proposal type {0}")]
    UnknownProposalType(u64),

    /// Threshold bounds are inverted or equal.
    #[error("Threshold min {min} must be below max {max}")]
    InvalidThreshold {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// Amount string is malformed.
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),

    /// Milestone amounts do not add up to the escrow total.
    #[error("Milestones sum to {sum} base units, escrow total is {total}")]
    MilestoneMismatch {
        /// Escrow total
        total: u64,
        /// Sum of milestones
        sum: u64,
    },

    /// Encoding the transaction failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl BuildError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Serialization(_) => ErrorKind::Fatal,
            _ => ErrorKind::Validation,
        }
    }
}
