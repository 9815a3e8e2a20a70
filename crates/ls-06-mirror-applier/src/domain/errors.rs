//! # Applier Errors

use ls_01_chain_client::ChainClientError;
use ls_03_mirror_store::StoreError;
use ls_04_event_normalizer::NormalizeError;
use shared_types::ErrorKind;
use thiserror::Error;

/// Per-event apply failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApplyError {
    /// The raw envelope could not be normalized.
    #[error("Malformed event: {0}")]
    Normalize(#[from] NormalizeError),

    /// A chain read failed.
    #[error("Chain read failed: {0}")]
    Chain(#[from] ChainClientError),

    /// The mirror rejected or failed the commit.
    #[error("Mirror commit failed: {0}")]
    Store(#[from] StoreError),

    /// A chain object the handler depends on does not exist (yet).
    #[error("Chain object not found for {entity}")]
    NotFound {
        /// Entity key, e.g. `proposal:0x…`
        entity: String,
    },

    /// The DAO singleton has not been bootstrapped.
    #[error("DAO singleton missing; run bootstrap first")]
    NotBootstrapped,

    /// A chain object violates a mirror invariant.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Applying the event would overflow a mirrored counter.
    #[error("Counter {field} overflows")]
    Overflow {
        /// Counter name, e.g. `yes_votes`
        field: &'static str,
    },
}

impl ApplyError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplyError::Normalize(e) => e.kind(),
            ApplyError::Chain(e) => e.kind(),
            ApplyError::Store(e) => e.kind(),
            ApplyError::NotFound { .. } => ErrorKind::NotFound,
            ApplyError::NotBootstrapped => ErrorKind::Fatal,
            ApplyError::Invariant(_) | ApplyError::Overflow { .. } => ErrorKind::Validation,
        }
    }

    /// Whether this failure should be dead-lettered without retrying.
    pub fn is_permanent(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}
