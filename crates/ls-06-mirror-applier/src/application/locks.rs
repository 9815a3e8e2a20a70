//! # Entity Locks
//!
//! Keyed single flight: one event per entity at a time, different entities
//! in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle locks kept before unused entries are pruned.
const PRUNE_THRESHOLD: usize = 4096;

/// Per-entity async mutexes.
#[derive(Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EntityLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `entity`.
    pub async fn acquire(&self, entity: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        let lock = self
            .locks
            .entry(entity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no entity is tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_same_entity_is_serialized() {
        let locks = Arc::new(EntityLocks::new());
        let guard = locks.acquire("proposal:0x1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire("proposal:0x1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        // A different entity is not blocked.
        let _other = locks.acquire("proposal:0x2").await;

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_prune_drops_idle_locks() {
        let locks = EntityLocks::new();
        {
            let _g = locks.acquire("record:0x1").await;
        }
        let _held = locks.acquire("record:0x2").await;
        locks.prune();
        assert_eq!(locks.len(), 1);
    }
}
