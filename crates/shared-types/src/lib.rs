//! # Shared Types Crate
//!
//! Identifier and error vocabulary shared by the LabShareDAO mirror
//! subsystems.
//!
//! ## Design Principles
//!
//! - **Canonical identifiers**: every address or object id that enters the
//!   system is normalized to the 0x-prefixed, 64-hex-digit lowercase form
//!   exactly once, at the boundary, via [`ChainAddress::parse`].
//! - **One taxonomy**: every subsystem error maps onto [`ErrorKind`] so the
//!   route layer and the ingestor can decide "report", "retry" or "halt"
//!   without knowing which crate produced the error.
//! - **Injectable time**: anything that compares against wall-clock time
//!   takes a [`Clock`].

pub mod entities;
pub mod errors;
pub mod serde_helpers;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::{Clock, ManualClock, SystemClock};
