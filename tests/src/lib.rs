//! # LabShareDAO Mirror Test Suite
//!
//! Unified test crate for the mirror pipeline.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── harness.rs          # Wired node over the mock chain
//! │   └── integration/
//! │       ├── scenarios.rs    # End-to-end event streams
//! │       └── invariants.rs   # Mirror invariants under generated streams
//! └── benches/
//!     └── mirror_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p labshare-tests
//!
//! # By category
//! cargo test -p labshare-tests integration::scenarios::
//! cargo test -p labshare-tests integration::invariants::
//!
//! # Benchmarks
//! cargo bench -p labshare-tests
//! ```

#![allow(dead_code)]

#[cfg(test)]
pub mod harness;
pub mod integration;
