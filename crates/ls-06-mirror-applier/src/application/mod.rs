//! # Application Layer
//!
//! The applier service, its per-kind handlers and per-entity locks.

mod handlers;
pub mod locks;
pub mod service;

pub use locks::EntityLocks;
pub use service::MirrorApplier;
