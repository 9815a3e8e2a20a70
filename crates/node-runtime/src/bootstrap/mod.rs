//! # Bootstrap Module
//!
//! First-run initialization of the mirror.
//!
//! ## Initialization Sequence
//!
//! 1. Skip everything when the initialization flag is already set
//! 2. Read the DAO object from the chain and write the DAO singleton
//!    (an existing singleton and its cursor are kept)
//! 3. Seed the default sensor types and thresholds that are missing
//! 4. Set the initialization flag, in the same commit

pub mod seed;

pub use seed::{BootstrapOutcome, Bootstrapper, SensorSeed, DEFAULT_SENSORS};
