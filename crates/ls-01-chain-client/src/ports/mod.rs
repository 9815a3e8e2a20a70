//! # Ports Module
//!
//! The chain-facing port and its test double.

pub mod mock;
pub mod outbound;

pub use mock::MockChainClient;
pub use outbound::*;
