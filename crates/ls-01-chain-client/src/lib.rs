//! # LS-01 Chain Client
//!
//! Typed access to the chain's JSON-RPC surface.
//!
//! **Subsystem ID:** 01  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Everything the mirror needs from the chain goes through the
//! [`ChainClient`] port:
//! - object reads (`sui_getObject`), with "not found" as `Ok(None)`
//! - paged event queries (`suix_queryEvents`)
//! - live event subscription (`suix_subscribeEvent`)
//! - dry-run and dev-inspect for gas estimates and view calls
//! - the latest checkpoint, used as a liveness probe
//!
//! Every call is bounded by a request timeout; transport failures surface
//! as [`ChainClientError`] values whose [`kind`](ChainClientError::kind) is
//! `Network`.
//!
//! ## Module Structure
//!
//! ```text
//! ls-01-chain-client/
//! ├── domain/          # RawEvent, EventQuery/EventPage, ObjectFields, errors
//! ├── ports/           # ChainClient trait, EventSubscription, MockChainClient
//! ├── adapters/        # JsonRpcChainClient (HTTP + WebSocket)
//! └── config.rs        # ChainClientConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::JsonRpcChainClient;
pub use config::ChainClientConfig;
pub use domain::{
    ChainClientError, DevInspectResults, DryRunEffects, EventFilter, EventPage, EventQuery,
    GasCostSummary, ObjectFields, RawEvent, SortOrder,
};
pub use ports::{ChainClient, EventSubscription, MockChainClient};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
