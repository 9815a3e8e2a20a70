//! # LS-04 Event Normalizer
//!
//! Turns loosely typed chain events into [`NormalizedEvent`], a closed
//! tagged union the applier can match exhaustively.
//!
//! **Subsystem ID:** 04  
//! **Architecture:** Pure domain logic, no I/O
//!
//! ## Guarantees
//!
//! - Addresses and object ids come out canonical (`0x` + 64 lowercase hex).
//! - Integers are parsed through 256-bit arithmetic and narrowed to `u64`
//!   at the boundary, so oversized values are rejected instead of
//!   truncated.
//! - Unknown event names become [`NormalizedEvent::Unknown`], never an
//!   error.
//!
//! ## Module Structure
//!
//! ```text
//! ls-04-event-normalizer/
//! ├── domain/
//! │   ├── events.rs    # NormalizedEvent and its payload structs
//! │   └── errors.rs    # NormalizeError
//! ├── fields.rs        # payload field readers
//! └── normalizer.rs    # normalize()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
mod fields;
pub mod normalizer;

pub use domain::{
    AlertTriggered, DataRecordCreated, EntityKey, MemberAdded, NormalizeError, NormalizedEnvelope,
    NormalizedEvent, ProposalCreated, ProposalExecuted, VoteCast,
};
pub use normalizer::{normalize, parse_timestamp};
