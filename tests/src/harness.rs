//! # Test Harness
//!
//! A fully wired node over `MockChainClient`, the in-memory mirror and a
//! manual clock. Scenarios drive it either through the applier directly or
//! through the live ingestor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ls_01_chain_client::RawEvent;
use ls_03_mirror_store::{
    InMemoryKVStore, InMemoryMirrorStore, KvMirrorStore, MirrorSnapshot, MirrorStore,
};
use ls_05_event_ingestor::{EventIngestorApi, IngestorState};
use ls_06_mirror_applier::testing::{addr, ChainFixture};
use ls_06_mirror_applier::{ApplyOutcome, EventApplier};
use node_runtime::{NodeConfig, SubsystemContainer};
use shared_types::{ChainAddress, ManualClock, ObjectId};

/// Clock reading every harness starts at.
pub const START_MS: u64 = 100_000;

/// A bootstrapped node.
pub struct Harness {
    /// Mock chain with the DAO object.
    pub fx: ChainFixture,
    /// Shared manual clock.
    pub clock: Arc<ManualClock>,
    /// The mirror.
    pub store: Arc<InMemoryMirrorStore>,
    /// Every subsystem, wired.
    pub container: SubsystemContainer,
}

impl Harness {
    /// Node with the test configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Node with the test configuration adjusted by `tune`.
    pub async fn with_config(tune: impl FnOnce(&mut NodeConfig)) -> Self {
        let fx = ChainFixture::new();
        let mut config = NodeConfig::for_testing(fx.package.clone(), fx.dao_id.clone());
        tune(&mut config);

        let clock = Arc::new(ManualClock::new(START_MS));
        let store = Arc::new(KvMirrorStore::with_processed_capacity(
            InMemoryKVStore::new(),
            config.ingestor.processed_log_capacity,
        ));
        let container =
            SubsystemContainer::with_backends(config, fx.chain.clone(), store.clone(), clock.clone())
                .unwrap();
        container.bootstrapper().unwrap().run().await.unwrap();

        Self {
            fx,
            clock,
            store,
            container,
        }
    }

    /// Link user `U{n}` to `addr(n)`.
    pub async fn link(&self, n: u8) {
        self.container
            .commands()
            .link_address(&format!("U{n}"), &addr(n).to_string())
            .await
            .unwrap();
    }

    /// Apply one event through the applier.
    pub async fn apply(&self, raw: &RawEvent) -> ApplyOutcome {
        self.container.applier.apply(raw).await
    }

    /// Apply events in order.
    pub async fn apply_all(&self, events: &[RawEvent]) {
        for raw in events {
            self.apply(raw).await;
        }
    }

    /// Full mirror contents.
    pub async fn snapshot(&self) -> MirrorSnapshot {
        self.store.snapshot().await.unwrap()
    }

    /// Whether the event `tx#0` is in the processed log.
    pub async fn processed(&self, tx: &str) -> bool {
        self.container
            .applier
            .is_processed(&format!("{tx}#0"))
            .await
            .unwrap()
    }

    /// Start the live ingestor and wait until it is live.
    pub async fn go_live(&self) {
        self.container.control().start().await.unwrap();
        self.wait_for_state(IngestorState::Live).await;
    }

    /// Wait for the ingestor to reach `state`.
    pub async fn wait_for_state(&self, state: IngestorState) {
        let mut rx = self.container.ingestor.watch_state();
        tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == state))
            .await
            .expect("state not reached")
            .unwrap();
    }
}

/// Mirror contents with optimistic-concurrency versions cleared, so runs
/// that wrote the same facts through different paths compare equal.
pub fn settled(mut snapshot: MirrorSnapshot) -> MirrorSnapshot {
    if let Some(dao) = snapshot.dao.as_mut() {
        dao.version = 0;
    }
    snapshot.members.iter_mut().for_each(|m| m.version = 0);
    snapshot.proposals.iter_mut().for_each(|p| p.version = 0);
    snapshot.records.iter_mut().for_each(|r| r.version = 0);
    snapshot.thresholds.iter_mut().for_each(|t| t.version = 0);
    snapshot
}

/// Distinct object id for index `n`.
pub fn object(n: u32) -> ObjectId {
    let mut bytes = [0x0b; 32];
    bytes[28..].copy_from_slice(&n.to_be_bytes());
    ChainAddress::from_bytes(bytes)
}

/// Poll `check` on a 10 ms tick until it holds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..60_000 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
