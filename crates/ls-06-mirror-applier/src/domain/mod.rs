//! # Domain Module
//!
//! Apply outcomes, errors, the processed-event cache and chain object
//! decoding.

pub mod errors;
pub mod objects;
pub mod outcome;
pub mod processed;

pub use errors::*;
pub use objects::*;
pub use outcome::*;
pub use processed::*;
