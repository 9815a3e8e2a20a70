//! # Domain Module
//!
//! Mirror entities, derived status, query shapes and errors.

pub mod entities;
pub mod errors;
pub mod query;
pub mod status;

pub use entities::*;
pub use errors::*;
pub use query::*;
pub use status::*;
