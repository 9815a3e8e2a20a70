//! # Mirror Seed
//!
//! Creates the DAO singleton and the default sensor catalogue.

use std::sync::Arc;

use tracing::info;

use shared_types::{Clock, ObjectId};

use ls_01_chain_client::ChainClient;
use ls_03_mirror_store::{MirrorBatch, MirrorStore, MirrorWrite, SensorType, ThresholdConfig};
use ls_06_mirror_applier::dao_from_object;

use crate::errors::ServiceError;

/// A default sensor with its initial threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSeed {
    /// Sensor type id.
    pub sensor_type_id: u8,
    /// Display name.
    pub name: &'static str,
    /// Threshold lower bound.
    pub min_value: u64,
    /// Threshold upper bound.
    pub max_value: u64,
    /// Threshold description.
    pub description: &'static str,
}

/// Sensors seeded on first run.
pub const DEFAULT_SENSORS: [SensorSeed; 5] = [
    SensorSeed {
        sensor_type_id: 0,
        name: "Temperature",
        min_value: 18,
        max_value: 26,
        description: "Lab temperature (°C)",
    },
    SensorSeed {
        sensor_type_id: 1,
        name: "Humidity",
        min_value: 30,
        max_value: 60,
        description: "Relative humidity (%)",
    },
    SensorSeed {
        sensor_type_id: 2,
        name: "CO2",
        min_value: 400,
        max_value: 1000,
        description: "CO2 concentration (ppm)",
    },
    SensorSeed {
        sensor_type_id: 3,
        name: "Pressure",
        min_value: 980,
        max_value: 1050,
        description: "Air pressure (hPa)",
    },
    SensorSeed {
        sensor_type_id: 4,
        name: "Light",
        min_value: 100,
        max_value: 1000,
        description: "Illuminance (lux)",
    },
];

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The initialization flag was already set; nothing was written.
    AlreadyInitialized,
    /// The mirror was seeded.
    Seeded {
        /// Whether the DAO singleton was created by this run.
        dao_created: bool,
        /// Sensor types added.
        sensors_added: usize,
        /// Thresholds added.
        thresholds_added: usize,
    },
}

/// Seeds an empty mirror.
pub struct Bootstrapper {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn MirrorStore>,
    clock: Arc<dyn Clock>,
    dao_id: ObjectId,
}

impl Bootstrapper {
    /// Bootstrapper for the DAO object `dao_id`.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn MirrorStore>,
        clock: Arc<dyn Clock>,
        dao_id: ObjectId,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            dao_id,
        }
    }

    /// Seed the mirror once.
    pub async fn run(&self) -> Result<BootstrapOutcome, ServiceError> {
        if self.store.is_initialized().await? {
            info!("[bootstrap] Mirror already initialized");
            return Ok(BootstrapOutcome::AlreadyInitialized);
        }

        let mut batch = MirrorBatch::new();

        let dao_created = match self.store.get_dao().await? {
            Some(_) => false,
            None => {
                let object = self.chain.get_object(&self.dao_id).await?.ok_or_else(|| {
                    ServiceError::NotFound {
                        entity: "DAO object",
                        key: self.dao_id.to_string(),
                    }
                })?;
                let dao = dao_from_object(&object)?;
                info!(dao = %dao.dao_id, name = %dao.name, admin = %dao.admin, "[bootstrap] DAO read from chain");
                batch.push(MirrorWrite::Dao(dao));
                true
            }
        };

        let now = self.clock.now_ms();
        let known_sensors: Vec<u8> = self
            .store
            .sensor_types()
            .await?
            .iter()
            .map(|s| s.sensor_type_id)
            .collect();
        let mut sensors_added = 0;
        let mut thresholds_added = 0;

        for seed in DEFAULT_SENSORS {
            if !known_sensors.contains(&seed.sensor_type_id) {
                batch.push(MirrorWrite::SensorType(SensorType {
                    sensor_type_id: seed.sensor_type_id,
                    name: seed.name.to_string(),
                    active: true,
                }));
                sensors_added += 1;
            }
            if self.store.get_threshold(seed.sensor_type_id).await?.is_none() {
                batch.push(MirrorWrite::Threshold(ThresholdConfig {
                    sensor_type_id: seed.sensor_type_id,
                    min_value: seed.min_value,
                    max_value: seed.max_value,
                    description: seed.description.to_string(),
                    active: true,
                    updated_at: now,
                    version: 0,
                }));
                thresholds_added += 1;
            }
        }

        batch.push(MirrorWrite::SetInitialized);
        self.store.commit(batch).await?;

        info!(
            dao_created,
            sensors_added, thresholds_added, "[bootstrap] Mirror seeded"
        );
        Ok(BootstrapOutcome::Seeded {
            dao_created,
            sensors_added,
            thresholds_added,
        })
    }
}
