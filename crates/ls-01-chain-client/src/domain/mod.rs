//! # Domain Module
//!
//! Wire-level types exchanged with the chain.

pub mod entities;
pub mod errors;
pub mod objects;

pub use entities::*;
pub use errors::*;
pub use objects::*;
