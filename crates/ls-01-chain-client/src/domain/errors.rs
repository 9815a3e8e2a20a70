//! # Domain Errors

use shared_types::ErrorKind;
use thiserror::Error;

/// Chain client error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainClientError {
    /// Transport-level failure talking to the RPC endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured bound.
    #[error("RPC call {method} timed out after {timeout_ms}ms")]
    Timeout {
        /// JSON-RPC method name
        method: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// The endpoint answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// Error message from the node
        message: String,
    },

    /// The node rejected the event cursor.
    #[error("Invalid event cursor: {0}")]
    InvalidCursor(String),

    /// The response did not have the expected shape.
    #[error("Failed to decode chain response: {0}")]
    Decode(String),

    /// A live subscription ended.
    #[error("Event subscription closed")]
    SubscriptionClosed,
}

impl ChainClientError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainClientError::Network(_)
            | ChainClientError::Timeout { .. }
            | ChainClientError::Rpc { .. }
            | ChainClientError::SubscriptionClosed => ErrorKind::Network,
            ChainClientError::InvalidCursor(_) => ErrorKind::Fatal,
            ChainClientError::Decode(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ChainClientError::Timeout {
                method: "sui_getObject".into(),
                timeout_ms: 30_000
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(ChainClientError::InvalidCursor("x".into()).kind(), ErrorKind::Fatal);
        assert_eq!(ChainClientError::Decode("x".into()).kind(), ErrorKind::Validation);
    }
}
