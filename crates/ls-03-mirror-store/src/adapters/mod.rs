//! # Adapters
//!
//! Key-value backends and the mirror store built on them.

pub mod kv_mirror;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use kv_mirror::KvMirrorStore;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbStore};
