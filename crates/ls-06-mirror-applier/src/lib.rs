//! # LS-06 Mirror Applier
//!
//! Deterministic, idempotent application of chain events to the mirror.
//!
//! **Subsystem ID:** 06  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Handlers
//!
//! | Event | Effect |
//! |-------|--------|
//! | `MemberAdded` | link becomes a member (count +1 once), or a pending member is staged |
//! | `DataRecordCreated` | record fetched from chain and inserted if absent; staged alert link absorbed |
//! | `ProposalCreated` | proposal fetched from chain and inserted if absent, empty tallies |
//! | `VoteCast` | voter appended once; matching tally raised by its power |
//! | `ProposalExecuted` | final flags and tallies; approved threshold change applied; treasury refreshed |
//! | `AlertTriggered` | record linked to its alert proposal, or the link is staged |
//!
//! ## Guarantees
//!
//! - Events for one entity are applied one at a time ([`EntityLocks`]).
//! - An event's writes, its processed-log entry and the cursor advance
//!   commit together or not at all.
//! - A failed event stays out of the processed log. `Validation` failures
//!   are dead-lettered at once; others after `max_event_retries` attempts.
//! - A handler whose chain object is missing parks the envelope on its
//!   entity; the next event for that entity replays it first.
//!
//! ## Module Structure
//!
//! ```text
//! ls-06-mirror-applier/
//! ├── domain/
//! │   ├── errors.rs     # ApplyError
//! │   ├── outcome.rs    # ApplyOutcome
//! │   ├── processed.rs  # ProcessedEventSet (LRU)
//! │   └── objects.rs    # chain object → Proposal / DataRecord / Dao
//! ├── ports/
//! │   ├── inbound.rs    # EventApplier trait
//! │   └── outbound.rs   # ChainClient, MirrorStore, Clock
//! ├── application/
//! │   ├── service.rs    # MirrorApplier
//! │   ├── handlers.rs   # per-kind handlers
//! │   └── locks.rs      # EntityLocks
//! └── config.rs         # ApplierConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod testing;

// Re-exports
pub use application::{EntityLocks, MirrorApplier};
pub use config::ApplierConfig;
pub use domain::{
    dao_from_object, data_record_from_object, proposal_from_object, treasury_balance, ApplyError,
    ApplyOutcome, ProcessedEventSet,
};
pub use ports::EventApplier;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
