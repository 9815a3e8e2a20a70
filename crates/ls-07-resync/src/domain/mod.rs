//! # Domain Module

pub mod errors;
pub mod report;

pub use errors::*;
pub use report::*;
