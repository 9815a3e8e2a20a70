//! # LS-05 Event Ingestor
//!
//! Long-running subscription to the DAO module's events, feeding the
//! mirror applier.
//!
//! **Subsystem ID:** 05  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Responsibilities
//!
//! - **Subscription**: `Subscribing` opens `subscribeEvents`; success moves to `Live`.
//! - **Deduplication**: a bounded LRU of `txDigest#eventSeq` drops repeats
//!   before they reach the applier.
//! - **Health check**: while `Live`, a periodic tick probes the latest
//!   checkpoint once the stream has been quiet for `idle_window_ms`; a
//!   failed probe reconnects.
//! - **Reconnection**: attempt `n` waits `reconnect_delay_ms * n`; more
//!   than `max_reconnect_attempts` consecutive failures stop the ingestor
//!   with a `Fatal` error.
//! - **Backpressure**: when `buffer_capacity` events are waiting, the
//!   subscription is dropped and the ingestor reconnects; the catch-up after
//!   resubscribing replays whatever was dropped.
//! - **Cancellation**: `stop_listening` releases the subscription, stops the
//!   health timer and waits for buffered events to apply.
//!
//! ## Module Structure
//!
//! ```text
//! ls-05-event-ingestor/
//! ├── domain/
//! │   ├── errors.rs   # IngestorError
//! │   └── state.rs    # IngestorState, IngestorStatus
//! ├── ports/
//! │   ├── inbound.rs  # EventIngestorApi
//! │   └── outbound.rs # ChainClient, EventApplier, ResyncApi, Clock
//! ├── service.rs      # EventIngestor (supervisor + consumer tasks)
//! └── config.rs       # IngestorConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use config::IngestorConfig;
pub use domain::{IngestorError, IngestorState, IngestorStatus};
pub use ports::EventIngestorApi;
pub use service::EventIngestor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
