//! # Domain Module

pub mod errors;
pub mod events;

pub use errors::*;
pub use events::*;
