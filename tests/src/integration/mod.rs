//! Cross-subsystem runs against a wired node.

pub mod invariants;
pub mod scenarios;
