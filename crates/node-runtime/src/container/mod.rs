//! # Subsystem Container
//!
//! Configuration plus the container that owns every subsystem instance.

pub mod config;
pub mod subsystems;

pub use config::{
    BuilderConfig, ChainConfig, ConfigError, IngestionConfig, NodeConfig, StoreBackend,
    StoreConfig,
};
pub use subsystems::SubsystemContainer;
