//! # Node Runtime Library
//!
//! Wiring and services of the LabShareDAO mirror node. The `labshare-node`
//! binary (`main.rs`) is a thin CLI over this library.
//!
//! ## Data Flow
//!
//! ```text
//! chain ──subscription──→ Ingestor(5) ──→ Applier(6) ──commit──→ Mirror(3)
//!   ▲                          │                                    │
//!   │                     Resync(7) ─────────────────────────────────┤
//!   │                                                                │
//!   └── wallet signs ←── CommandService ←── route layer ──→ QueryService
//!                          TxBuilder(2)
//! ```
//!
//! ## Module Structure
//!
//! - `container/` - configuration and the subsystem container
//! - `bootstrap/` - first-run seeding of the DAO singleton and sensors
//! - `handlers/` - query, command and ingestor-control services
//! - `runtime.rs` - startup, monitoring and graceful shutdown
//! - `errors.rs` - `ServiceError` for the route layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod container;
pub mod errors;
pub mod handlers;
pub mod runtime;

pub use bootstrap::{BootstrapOutcome, Bootstrapper};
pub use container::{ConfigError, NodeConfig, SubsystemContainer};
pub use errors::ServiceError;
pub use handlers::{CommandService, IngestorControl, PreparedTransaction, QueryService};
pub use runtime::NodeRuntime;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
