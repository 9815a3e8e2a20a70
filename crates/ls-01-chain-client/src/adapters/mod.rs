//! # Adapters
//!
//! Production implementations of the chain port.

pub mod json_rpc;

pub use json_rpc::JsonRpcChainClient;
