//! # Node Configuration
//!
//! Unified configuration for the mirror node, split into the sections the
//! subsystems consume.
//!
//! ## Sources
//!
//! 1. Defaults ([`NodeConfig::default`])
//! 2. `LSD_*` environment variables ([`NodeConfig::from_env`])
//! 3. CLI flags (applied by the binary on top of the environment)
//!
//! [`NodeConfig::validate`] must pass before the container is built.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use shared_types::{ErrorKind, Network, ObjectId};
use thiserror::Error;

use ls_01_chain_client::{ChainClientConfig, EventFilter};
use ls_02_tx_builder::TxBuilderConfig;
use ls_05_event_ingestor::IngestorConfig;
use ls_06_mirror_applier::ApplierConfig;
use ls_07_resync::ResyncConfig;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Chain endpoint and contract coordinates.
    pub chain: ChainConfig,
    /// Ingestion, application and resync limits.
    pub ingestor: IngestionConfig,
    /// Mirror storage backend.
    pub store: StoreConfig,
    /// Transaction builder settings.
    pub builder: BuilderConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    /// A setting could not be parsed.
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        /// Setting name
        field: &'static str,
        /// Parser message
        reason: String,
    },

    /// A limit that must be positive is zero.
    #[error("Setting '{0}' must be greater than zero")]
    ZeroLimit(&'static str),

    /// The selected backend was not compiled in.
    #[error("Store backend '{0}' is not available in this build")]
    BackendUnavailable(&'static str),
}

impl ConfigError {
    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::BackendUnavailable(_) => ErrorKind::Fatal,
            _ => ErrorKind::Validation,
        }
    }
}

/// Chain endpoint and contract coordinates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// HTTP(S) JSON-RPC endpoint.
    pub chain_rpc_url: String,
    /// WebSocket endpoint; derived from `chain_rpc_url` when unset.
    pub chain_ws_url: Option<String>,
    /// Published contract package.
    pub package_id: Option<ObjectId>,
    /// Shared DAO object.
    pub dao_object_id: Option<ObjectId>,
    /// Network tag.
    pub network: Network,
    /// Contract module whose events are mirrored.
    pub module_name: String,
    /// Upper bound on every RPC call.
    pub rpc_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_rpc_url: Network::Testnet.default_rpc_url().to_string(),
            chain_ws_url: None,
            package_id: None,
            dao_object_id: None,
            network: Network::Testnet,
            module_name: "dao".to_string(),
            rpc_timeout_ms: 30_000,
        }
    }
}

/// Ingestion, application and resync limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Quiet period before the subscription is probed.
    pub idle_window_ms: u64,
    /// Period of the health check.
    pub health_check_interval_ms: u64,
    /// Base reconnect delay; attempt `n` waits `n` times this.
    pub reconnect_delay_ms: u64,
    /// Reconnect attempts before the ingestor stops.
    pub max_reconnect_attempts: u32,
    /// Recently seen event ids kept in memory.
    pub event_cache_size: usize,
    /// Events per resync page.
    pub resync_page_limit: usize,
    /// Events buffered between the subscription and the applier.
    pub buffer_capacity: usize,
    /// Failed attempts before an event is dead-lettered.
    pub max_event_retries: u32,
    /// Entries kept in the persisted processed-event log.
    pub processed_log_capacity: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            idle_window_ms: 300_000,
            health_check_interval_ms: 30_000,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            event_cache_size: 1_000,
            resync_page_limit: 1_000,
            buffer_capacity: 10_000,
            max_event_retries: 3,
            processed_log_capacity: 100_000,
        }
    }
}

/// Mirror backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; lost on restart.
    #[default]
    Memory,
    /// RocksDB database at `StoreConfig::path`.
    Rocksdb,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "rocksdb" => Ok(StoreBackend::Rocksdb),
            other => Err(ConfigError::Invalid {
                field: "store.backend",
                reason: format!("unknown backend '{other}' (expected memory|rocksdb)"),
            }),
        }
    }
}

/// Mirror storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selector.
    pub backend: StoreBackend,
    /// Database directory for persistent backends.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/mirror"),
        }
    }
}

/// Transaction builder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Gas budget attached to every transaction.
    pub gas_budget: u64,
    /// Shared clock object.
    pub clock_object_id: ObjectId,
    /// Dry-run built transactions to attach a gas estimate.
    pub estimate_gas: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        let mut clock = [0u8; 32];
        clock[31] = 6;
        Self {
            gas_budget: 50_000_000,
            clock_object_id: ObjectId::from_bytes(clock),
            estimate_gas: true,
        }
    }
}

impl NodeConfig {
    /// Configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Configuration from an arbitrary variable source.
    ///
    /// Without `LSD_CHAIN_RPC_URL` the RPC endpoint follows `LSD_NETWORK`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = NodeConfig::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(network) = get("LSD_NETWORK") {
            config.chain.network = parse("chain.network", &network)?;
            config.chain.chain_rpc_url = config.chain.network.default_rpc_url().to_string();
        }
        if let Some(url) = get("LSD_CHAIN_RPC_URL") {
            config.chain.chain_rpc_url = url;
        }
        if let Some(url) = get("LSD_CHAIN_WS_URL") {
            config.chain.chain_ws_url = Some(url);
        }
        if let Some(id) = get("LSD_PACKAGE_ID") {
            config.chain.package_id = Some(parse("chain.package_id", &id)?);
        }
        if let Some(id) = get("LSD_DAO_OBJECT_ID") {
            config.chain.dao_object_id = Some(parse("chain.dao_object_id", &id)?);
        }
        if let Some(module) = get("LSD_MODULE_NAME") {
            config.chain.module_name = module;
        }
        override_num(&get, "LSD_RPC_TIMEOUT_MS", "chain.rpc_timeout_ms", &mut config.chain.rpc_timeout_ms)?;

        let ingestor = &mut config.ingestor;
        override_num(&get, "LSD_IDLE_WINDOW_MS", "ingestor.idle_window_ms", &mut ingestor.idle_window_ms)?;
        override_num(
            &get,
            "LSD_HEALTH_CHECK_INTERVAL_MS",
            "ingestor.health_check_interval_ms",
            &mut ingestor.health_check_interval_ms,
        )?;
        override_num(
            &get,
            "LSD_RECONNECT_DELAY_MS",
            "ingestor.reconnect_delay_ms",
            &mut ingestor.reconnect_delay_ms,
        )?;
        override_num(
            &get,
            "LSD_MAX_RECONNECT_ATTEMPTS",
            "ingestor.max_reconnect_attempts",
            &mut ingestor.max_reconnect_attempts,
        )?;
        override_num(&get, "LSD_EVENT_CACHE_SIZE", "ingestor.event_cache_size", &mut ingestor.event_cache_size)?;
        override_num(
            &get,
            "LSD_RESYNC_PAGE_LIMIT",
            "ingestor.resync_page_limit",
            &mut ingestor.resync_page_limit,
        )?;
        override_num(&get, "LSD_BUFFER_CAPACITY", "ingestor.buffer_capacity", &mut ingestor.buffer_capacity)?;
        override_num(
            &get,
            "LSD_MAX_EVENT_RETRIES",
            "ingestor.max_event_retries",
            &mut ingestor.max_event_retries,
        )?;
        override_num(
            &get,
            "LSD_PROCESSED_LOG_CAPACITY",
            "ingestor.processed_log_capacity",
            &mut ingestor.processed_log_capacity,
        )?;

        if let Some(backend) = get("LSD_STORE_BACKEND") {
            config.store.backend = backend.parse()?;
        }
        if let Some(path) = get("LSD_STORE_PATH") {
            config.store.path = PathBuf::from(path);
        }

        override_num(&get, "LSD_GAS_BUDGET", "builder.gas_budget", &mut config.builder.gas_budget)?;
        if let Some(id) = get("LSD_CLOCK_OBJECT_ID") {
            config.builder.clock_object_id = parse("builder.clock_object_id", &id)?;
        }
        if let Some(flag) = get("LSD_ESTIMATE_GAS") {
            config.builder.estimate_gas = parse("builder.estimate_gas", &flag)?;
        }

        Ok(config)
    }

    /// Check that the configuration can run a node.
    ///
    /// Ids are already canonical once parsed; this rejects missing ids,
    /// unusable URLs and zero limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.package_id()?;
        self.dao_object_id()?;

        let url = &self.chain.chain_rpc_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "chain.chain_rpc_url",
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
        if self.chain.module_name.trim().is_empty() {
            return Err(ConfigError::Missing("chain.module_name"));
        }

        let limits: [(&'static str, u64); 10] = [
            ("chain.rpc_timeout_ms", self.chain.rpc_timeout_ms),
            ("ingestor.idle_window_ms", self.ingestor.idle_window_ms),
            ("ingestor.health_check_interval_ms", self.ingestor.health_check_interval_ms),
            ("ingestor.reconnect_delay_ms", self.ingestor.reconnect_delay_ms),
            ("ingestor.event_cache_size", self.ingestor.event_cache_size as u64),
            ("ingestor.resync_page_limit", self.ingestor.resync_page_limit as u64),
            ("ingestor.buffer_capacity", self.ingestor.buffer_capacity as u64),
            ("ingestor.max_event_retries", u64::from(self.ingestor.max_event_retries)),
            ("ingestor.processed_log_capacity", self.ingestor.processed_log_capacity),
            ("builder.gas_budget", self.builder.gas_budget),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroLimit(*name));
        }

        if self.store.backend == StoreBackend::Rocksdb {
            if self.store.path.as_os_str().is_empty() {
                return Err(ConfigError::Missing("store.path"));
            }
            if !cfg!(feature = "rocksdb") {
                return Err(ConfigError::BackendUnavailable("rocksdb"));
            }
        }
        Ok(())
    }

    /// Contract package id.
    pub fn package_id(&self) -> Result<ObjectId, ConfigError> {
        self.chain
            .package_id
            .clone()
            .ok_or(ConfigError::Missing("chain.package_id"))
    }

    /// DAO object id.
    pub fn dao_object_id(&self) -> Result<ObjectId, ConfigError> {
        self.chain
            .dao_object_id
            .clone()
            .ok_or(ConfigError::Missing("chain.dao_object_id"))
    }

    /// Events the node mirrors.
    pub fn event_filter(&self) -> Result<EventFilter, ConfigError> {
        Ok(EventFilter::MoveModule {
            package: self.package_id()?,
            module: self.chain.module_name.clone(),
        })
    }

    /// Chain client settings.
    pub fn chain_client_config(&self) -> ChainClientConfig {
        ChainClientConfig {
            rpc_url: self.chain.chain_rpc_url.clone(),
            ws_url: self.chain.chain_ws_url.clone(),
            request_timeout_ms: self.chain.rpc_timeout_ms,
            ..ChainClientConfig::default()
        }
    }

    /// Transaction builder settings.
    pub fn builder_config(&self) -> Result<TxBuilderConfig, ConfigError> {
        let mut config = TxBuilderConfig::new(self.package_id()?, self.dao_object_id()?);
        config.dao_module = self.chain.module_name.clone();
        config.clock_object_id = self.builder.clock_object_id.clone();
        config.gas_budget = self.builder.gas_budget;
        Ok(config)
    }

    /// Applier settings.
    pub fn applier_config(&self) -> ApplierConfig {
        ApplierConfig {
            event_cache_size: self.ingestor.event_cache_size,
            max_event_retries: self.ingestor.max_event_retries,
            ..ApplierConfig::default()
        }
    }

    /// Resync settings.
    pub fn resync_config(&self) -> ResyncConfig {
        ResyncConfig {
            page_limit: self.ingestor.resync_page_limit,
        }
    }

    /// Ingestor settings.
    pub fn ingestor_config(&self) -> IngestorConfig {
        IngestorConfig {
            idle_window_ms: self.ingestor.idle_window_ms,
            health_check_interval_ms: self.ingestor.health_check_interval_ms,
            reconnect_delay_ms: self.ingestor.reconnect_delay_ms,
            max_reconnect_attempts: self.ingestor.max_reconnect_attempts,
            event_cache_size: self.ingestor.event_cache_size,
            buffer_capacity: self.ingestor.buffer_capacity,
        }
    }

    /// Short timers and small buffers for tests, with the given contract ids.
    pub fn for_testing(package_id: ObjectId, dao_object_id: ObjectId) -> Self {
        let mut config = NodeConfig::default();
        config.chain.package_id = Some(package_id);
        config.chain.dao_object_id = Some(dao_object_id);
        config.ingestor = IngestionConfig {
            idle_window_ms: 1_000,
            health_check_interval_ms: 100,
            reconnect_delay_ms: 50,
            max_reconnect_attempts: 3,
            event_cache_size: 64,
            resync_page_limit: 3,
            buffer_capacity: 128,
            max_event_retries: 2,
            processed_log_capacity: 1_000,
        };
        config
    }
}

fn parse<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}

fn override_num<G, T>(get: &G, var: &str, field: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = get(var) {
        *target = parse(field, &raw)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ===== TEST HELPERS =====

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn ids() -> (ObjectId, ObjectId) {
        (ObjectId::from_bytes([0xaa; 32]), ObjectId::from_bytes([0xda; 32]))
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.ingestor.idle_window_ms, 300_000);
        assert_eq!(config.ingestor.reconnect_delay_ms, 5_000);
        assert_eq!(config.ingestor.max_reconnect_attempts, 10);
        assert_eq!(config.ingestor.event_cache_size, 1_000);
        assert_eq!(config.ingestor.resync_page_limit, 1_000);
        assert_eq!(config.ingestor.buffer_capacity, 10_000);
        assert_eq!(config.chain.module_name, "dao");
        assert_eq!(config.builder.gas_budget, 50_000_000);
        assert_eq!(config.builder.clock_object_id.as_str(), format!("0x{}6", "0".repeat(63)));
    }

    #[test]
    fn test_env_overrides_and_canonicalizes() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("LSD_NETWORK", "devnet"),
            ("LSD_PACKAGE_ID", "0xAA"),
            ("LSD_DAO_OBJECT_ID", "0xda"),
            ("LSD_IDLE_WINDOW_MS", "60000"),
            ("LSD_BUFFER_CAPACITY", "500"),
            ("LSD_STORE_BACKEND", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.chain.network, Network::Devnet);
        assert_eq!(config.chain.chain_rpc_url, Network::Devnet.default_rpc_url());
        assert_eq!(
            config.package_id().unwrap().as_str(),
            format!("0x{}aa", "0".repeat(62))
        );
        assert_eq!(config.ingestor.idle_window_ms, 60_000);
        assert_eq!(config.ingestor.buffer_capacity, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_rpc_url_wins_over_network() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("LSD_NETWORK", "mainnet"),
            ("LSD_CHAIN_RPC_URL", "http://127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.chain.chain_rpc_url, "http://127.0.0.1:9000");
        assert_eq!(
            config.chain_client_config().effective_ws_url(),
            "ws://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = NodeConfig::from_lookup(lookup(&[("LSD_IDLE_WINDOW_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "ingestor.idle_window_ms", .. }));

        let err = NodeConfig::from_lookup(lookup(&[("LSD_PACKAGE_ID", "0xnothex")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = NodeConfig::from_lookup(lookup(&[("LSD_NETWORK", "moonnet")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "chain.network", .. }));
    }

    #[test]
    fn test_validate_requires_ids() {
        let err = NodeConfig::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::Missing("chain.package_id"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let (package, dao) = ids();
        let mut config = NodeConfig::for_testing(package, dao);
        config.ingestor.resync_page_limit = 0;
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::ZeroLimit("ingestor.resync_page_limit")
        );
    }

    #[test]
    fn test_component_configs_follow_sections() {
        let (package, dao) = ids();
        let config = NodeConfig::for_testing(package.clone(), dao.clone());
        assert!(config.validate().is_ok());

        let ingestor = config.ingestor_config();
        assert_eq!(ingestor.buffer_capacity, 128);
        assert_eq!(config.resync_config().page_limit, 3);
        assert_eq!(config.applier_config().max_event_retries, 2);

        let builder = config.builder_config().unwrap();
        assert_eq!(builder.package_id, package);
        assert_eq!(builder.dao_object_id, dao);
        assert_eq!(builder.dao_module, "dao");

        match config.event_filter().unwrap() {
            EventFilter::MoveModule { package: p, module } => {
                assert_eq!(p, package);
                assert_eq!(module, "dao");
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_backend_needs_feature() {
        let (package, dao) = ids();
        let mut config = NodeConfig::for_testing(package, dao);
        config.store.backend = StoreBackend::Rocksdb;
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::BackendUnavailable("rocksdb")
        );
    }
}
