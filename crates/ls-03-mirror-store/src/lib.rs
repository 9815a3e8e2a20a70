//! # LS-03 Mirror Store
//!
//! Typed persistence for the mirrored DAO state.
//!
//! **Subsystem ID:** 03  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Holds the DAO singleton, member links, proposals, data records, sensor
//! types and thresholds, plus the pipeline's own bookkeeping: the
//! processed-event log, dead letters, deferred events and staged links.
//!
//! ## Consistency
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | Atomic batches | `commit` stages every write, then one `atomic_batch_write` |
//! | Optimistic concurrency | stored `version` must equal the writer's, else `Conflict` |
//! | Unique `userId` | `member_user/` index checked inside the batch |
//! | Unique `seqId` | `proposal_seq/` and `record_seq/` indices |
//! | Threshold bounds | `min_value < max_value` or `Invariant` |
//! | Bounded processed log | ring of `processed_capacity` slots, oldest evicted |
//!
//! ## Module Structure
//!
//! ```text
//! ls-03-mirror-store/
//! ├── domain/          # Entities, ProposalStatus, filters, pagination, errors
//! ├── ports/
//! │   ├── inbound.rs   # MirrorStore trait, MirrorBatch, MirrorWrite
//! │   └── outbound.rs  # KeyValueStore trait, BatchOperation
//! ├── adapters/
//! │   ├── kv_mirror.rs # KvMirrorStore<K: KeyValueStore>
//! │   ├── memory.rs    # InMemoryKVStore
//! │   └── rocksdb.rs   # RocksDbStore (feature "rocksdb")
//! └── keys.rs          # Storage key layout
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
mod keys;
pub mod ports;

// Re-exports
pub use adapters::kv_mirror::{DEFAULT_PROCESSED_CAPACITY, HISTOGRAM_DAYS};
pub use adapters::{InMemoryKVStore, KvMirrorStore};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use domain::*;
pub use ports::{BatchOperation, KeyValueStore, MirrorBatch, MirrorStore, MirrorWrite};

/// Mirror store over the in-memory backend.
pub type InMemoryMirrorStore = KvMirrorStore<InMemoryKVStore>;

impl InMemoryMirrorStore {
    /// Empty in-memory mirror.
    pub fn in_memory() -> Self {
        KvMirrorStore::new(InMemoryKVStore::new())
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
