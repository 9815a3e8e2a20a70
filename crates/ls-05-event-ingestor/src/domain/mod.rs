//! # Domain Module

pub mod errors;
pub mod state;

pub use errors::*;
pub use state::*;
