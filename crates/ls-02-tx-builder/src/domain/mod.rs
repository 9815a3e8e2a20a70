//! # Domain Module

pub mod amount;
pub mod call;
pub mod errors;
pub mod intents;

pub use amount::*;
pub use call::*;
pub use errors::*;
pub use intents::*;
