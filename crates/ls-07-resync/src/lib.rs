//! # LS-07 Resync Controller
//!
//! Bounded catch-up through the mirror applier.
//!
//! **Subsystem ID:** 07  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Modes
//!
//! | Mode | Reads | Applies |
//! |------|-------|---------|
//! | Cursor | ascending pages after the cursor until `hasNextPage=false` | every event |
//! | Recent | descending pages until an event is older than `now - hours` | window events not yet processed, oldest first |
//!
//! Both paths go through the same [`EventApplier`](ls_06_mirror_applier::EventApplier)
//! as live traffic. Per-event failures are counted in the
//! [`ResyncReport`]; only a failed page query aborts a run.
//!
//! ## Module Structure
//!
//! ```text
//! ls-07-resync/
//! ├── domain/
//! │   ├── errors.rs   # ResyncError
//! │   └── report.rs   # ResyncReport, ResyncMode
//! ├── ports/
//! │   ├── inbound.rs  # ResyncApi
//! │   └── outbound.rs # ChainClient, EventApplier, MirrorStore, Clock
//! ├── service.rs      # ResyncController
//! └── config.rs       # ResyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use config::{ResyncConfig, DEFAULT_RESYNC_PAGE_LIMIT, MAX_WINDOW_HOURS, MIN_WINDOW_HOURS};
pub use domain::{ResyncError, ResyncMode, ResyncReport};
pub use ports::ResyncApi;
pub use service::ResyncController;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
