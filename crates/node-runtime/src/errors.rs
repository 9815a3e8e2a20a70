//! # Service Errors
//!
//! The single error type handed to the route layer. Every subsystem error
//! converts into it, and [`ServiceError::kind`] tells the caller whether to
//! report, retry or halt.

use shared_types::{ChainAddress, ErrorKind};
use thiserror::Error;

use ls_01_chain_client::ChainClientError;
use ls_02_tx_builder::BuildError;
use ls_03_mirror_store::StoreError;
use ls_05_event_ingestor::IngestorError;
use ls_06_mirror_applier::ApplyError;
use ls_07_resync::ResyncError;

use crate::container::ConfigError;

/// Errors surfaced by the node's query, command and control services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Chain RPC failure.
    #[error(transparent)]
    Chain(#[from] ChainClientError),

    /// Intent failed validation or encoding.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Mirror store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Chain object could not be mapped into the mirror.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Ingestor control failure.
    #[error(transparent)]
    Ingestor(#[from] IngestorError),

    /// Resync failure.
    #[error(transparent)]
    Resync(#[from] ResyncError),

    /// Request parameter rejected before reaching a subsystem.
    #[error("Invalid '{field}': {reason}")]
    InvalidInput {
        /// Parameter name
        field: &'static str,
        /// Why
        reason: String,
    },

    /// Requested entity is not in the mirror or on chain.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity name
        entity: &'static str,
        /// Lookup key
        key: String,
    },

    /// Address or user is already linked.
    #[error("{what} is already linked: {key}")]
    AlreadyLinked {
        /// `address` or `user`
        what: &'static str,
        /// The taken value
        key: String,
    },

    /// Voter already appears on the proposal.
    #[error("{voter} already voted on proposal {proposal}")]
    AlreadyVoted {
        /// Proposal object id
        proposal: String,
        /// Voter address
        voter: ChainAddress,
    },

    /// Sender lacks the role the action needs.
    #[error("{action} requires the {role} role; {sender} does not hold it")]
    Unauthorized {
        /// Command name
        action: &'static str,
        /// `admin` or `member`
        role: &'static str,
        /// Signing address
        sender: ChainAddress,
    },

    /// The DAO singleton has not been seeded.
    #[error("Mirror is not bootstrapped")]
    NotBootstrapped,
}

impl ServiceError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Config(e) => e.kind(),
            ServiceError::Chain(e) => e.kind(),
            ServiceError::Build(e) => e.kind(),
            ServiceError::Store(e) => e.kind(),
            ServiceError::Apply(e) => e.kind(),
            ServiceError::Ingestor(e) => e.kind(),
            ServiceError::Resync(e) => e.kind(),
            ServiceError::InvalidInput { .. } => ErrorKind::Validation,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::AlreadyLinked { .. } | ServiceError::AlreadyVoted { .. } => {
                ErrorKind::Conflict
            }
            ServiceError::Unauthorized { .. } => ErrorKind::Authz,
            ServiceError::NotBootstrapped => ErrorKind::Fatal,
        }
    }
}
