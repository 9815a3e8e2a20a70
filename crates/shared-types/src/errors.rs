//! # Error Types
//!
//! The error taxonomy shared by all subsystems. Each crate keeps its own
//! `thiserror` enum and classifies it through `kind()`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories understood across subsystem boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed address, out-of-range value, bad proposal type.
    Validation,
    /// A chain object or mirror entity is missing.
    NotFound,
    /// RPC transport failure or timeout.
    Network,
    /// Unique-key or optimistic-concurrency violation in the mirror.
    Conflict,
    /// Caller lacks the admin/member role for the action.
    Authz,
    /// Reconnection budget exhausted, corrupt cursor.
    Fatal,
}

impl ErrorKind {
    /// Whether repeating the same operation can succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Conflict)
    }

    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Network => "network",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Authz => "authz",
            ErrorKind::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing identifiers at the system boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Address was empty after stripping the prefix.
    #[error("Empty address")]
    EmptyAddress,

    /// Address has more hex digits than fit in 32 bytes.
    #[error("Address too long: {len} hex digits (max 64)")]
    AddressTooLong { len: usize },

    /// Address contains a non-hex character.
    #[error("Invalid hex in address: {input}")]
    InvalidHex { input: String },

    /// Unknown network tag.
    #[error("Unknown network: {0} (expected mainnet|testnet|devnet|localnet)")]
    UnknownNetwork(String),

    /// Proposal type outside {0, 1, 2}.
    #[error("Invalid proposal type: {0}")]
    InvalidProposalType(u64),

    /// Integer literal could not be parsed or does not fit.
    #[error("Invalid integer: {0}")]
    InvalidInteger(String),
}

impl IdentifierError {
    /// All identifier errors are caller mistakes.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Fatal.is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        let json = serde_json::to_string(&ErrorKind::Authz).unwrap();
        assert_eq!(json, "\"authz\"");
    }

    #[test]
    fn test_identifier_error_message() {
        let err = IdentifierError::AddressTooLong { len: 70 };
        assert!(err.to_string().contains("70"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
