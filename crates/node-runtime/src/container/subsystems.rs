//! # Subsystem Container
//!
//! Holds every subsystem instance and wires them together.
//!
//! ## Construction Order
//!
//! ```text
//! Level 0: Clock, Chain Client (ls-01), Mirror Store (ls-03)
//! Level 1: Mirror Applier (ls-06)          ← chain, store
//! Level 2: Resync Controller (ls-07)       ← chain, applier, store
//! Level 3: Event Ingestor (ls-05)          ← chain, applier, resync
//! Pure:    Transaction Builder (ls-02)
//! ```
//!
//! ## Thread Safety
//!
//! - All subsystems are shared through `Arc`
//! - The mirror is written only by the applier and by `linkAddress`

use std::sync::Arc;

use tracing::info;

use shared_types::{Clock, SystemClock};

use ls_01_chain_client::{ChainClient, EventFilter, JsonRpcChainClient};
use ls_02_tx_builder::TxBuilder;
use ls_03_mirror_store::{InMemoryKVStore, KvMirrorStore, MirrorStore};
use ls_05_event_ingestor::EventIngestor;
use ls_06_mirror_applier::MirrorApplier;
use ls_07_resync::ResyncController;

use crate::bootstrap::Bootstrapper;
use crate::container::config::{NodeConfig, StoreBackend};
use crate::errors::ServiceError;
use crate::handlers::{CommandService, IngestorControl, QueryService};

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    /// Configuration the container was built from.
    pub config: NodeConfig,
    /// Wall clock for status derivation and bookkeeping.
    pub clock: Arc<dyn Clock>,
    /// Events the node mirrors.
    pub filter: EventFilter,

    // =========================================================================
    // LEVEL 0
    // =========================================================================
    /// Chain Client (Subsystem 1)
    pub chain: Arc<dyn ChainClient>,

    /// Mirror Store (Subsystem 3)
    pub store: Arc<dyn MirrorStore>,

    // =========================================================================
    // LEVEL 1-3
    // =========================================================================
    /// Mirror Applier (Subsystem 6)
    pub applier: Arc<MirrorApplier>,

    /// Resync Controller (Subsystem 7)
    pub resync: Arc<ResyncController>,

    /// Event Ingestor (Subsystem 5)
    pub ingestor: Arc<EventIngestor>,

    // =========================================================================
    // PURE
    // =========================================================================
    /// Transaction Builder (Subsystem 2)
    pub builder: Arc<TxBuilder>,
}

impl SubsystemContainer {
    /// Build the production container: JSON-RPC chain client, the
    /// configured store backend and the system clock.
    pub fn new(config: NodeConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let chain: Arc<dyn ChainClient> =
            Arc::new(JsonRpcChainClient::new(&config.chain_client_config())?);
        let store = open_store(&config)?;
        Self::with_backends(config, chain, store, Arc::new(SystemClock))
    }

    /// Build the container over caller-supplied backends.
    pub fn with_backends(
        config: NodeConfig,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn MirrorStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let filter = config.event_filter()?;
        let builder = Arc::new(TxBuilder::new(config.builder_config()?));

        let applier = Arc::new(MirrorApplier::new(
            Arc::clone(&chain),
            Arc::clone(&store),
            Arc::clone(&clock),
            config.applier_config(),
        ));
        let resync = Arc::new(ResyncController::new(
            Arc::clone(&chain),
            applier.clone(),
            Arc::clone(&store),
            Arc::clone(&clock),
            filter.clone(),
            config.resync_config(),
        ));
        let ingestor = Arc::new(EventIngestor::new(
            Arc::clone(&chain),
            applier.clone(),
            resync.clone(),
            Arc::clone(&clock),
            filter.clone(),
            config.ingestor_config(),
        ));

        info!(
            network = %config.chain.network,
            rpc = %config.chain.chain_rpc_url,
            backend = ?config.store.backend,
            "Subsystem container initialized"
        );

        Ok(Self {
            config,
            clock,
            filter,
            chain,
            store,
            applier,
            resync,
            ingestor,
            builder,
        })
    }

    /// Read-only query surface.
    pub fn queries(&self) -> QueryService {
        QueryService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.chain),
            self.ingestor.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// Unsigned-transaction command surface.
    pub fn commands(&self) -> CommandService {
        CommandService::new(
            Arc::clone(&self.builder),
            Arc::clone(&self.store),
            Arc::clone(&self.chain),
            Arc::clone(&self.clock),
            self.config.builder.estimate_gas,
        )
    }

    /// First-run seeding of the mirror.
    pub fn bootstrapper(&self) -> Result<Bootstrapper, ServiceError> {
        Ok(Bootstrapper::new(
            Arc::clone(&self.chain),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.dao_object_id()?,
        ))
    }

    /// Ingestor start/stop and resync.
    pub fn control(&self) -> IngestorControl {
        IngestorControl::new(self.ingestor.clone(), self.resync.clone())
    }
}

fn open_store(config: &NodeConfig) -> Result<Arc<dyn MirrorStore>, ServiceError> {
    let capacity = config.ingestor.processed_log_capacity;
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(KvMirrorStore::with_processed_capacity(
            InMemoryKVStore::new(),
            capacity,
        ))),
        StoreBackend::Rocksdb => open_rocksdb(config, capacity),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &NodeConfig, capacity: u64) -> Result<Arc<dyn MirrorStore>, ServiceError> {
    use ls_03_mirror_store::{RocksDbStore, StoreError};

    let kv = RocksDbStore::open_default(&config.store.path).map_err(StoreError::from)?;
    info!(path = ?config.store.path, "Opened RocksDB mirror");
    Ok(Arc::new(KvMirrorStore::with_processed_capacity(kv, capacity)))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_config: &NodeConfig, _capacity: u64) -> Result<Arc<dyn MirrorStore>, ServiceError> {
    Err(crate::container::ConfigError::BackendUnavailable("rocksdb").into())
}
