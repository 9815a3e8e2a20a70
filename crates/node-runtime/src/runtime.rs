//! # Node Runtime
//!
//! Owns the container and the background tasks of a running node.
//!
//! ## Startup Sequence
//!
//! 1. Bootstrap the mirror (no-op once initialized)
//! 2. Start the ingestor (subscribe, then catch up from the last cursor)
//! 3. Spawn the state monitor
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the monitor
//! 2. Stop the ingestor; in-flight events are applied first

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use ls_05_event_ingestor::{EventIngestorApi, IngestorState};

use crate::bootstrap::BootstrapOutcome;
use crate::container::SubsystemContainer;
use crate::errors::ServiceError;

/// The running node.
pub struct NodeRuntime {
    /// Subsystem container with all initialized services.
    container: Arc<SubsystemContainer>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Create a runtime over a built container.
    pub fn new(container: SubsystemContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bootstrap, start ingestion and the monitor.
    pub async fn start(&self) -> Result<BootstrapOutcome, ServiceError> {
        let config = &self.container.config;
        info!("===========================================");
        info!("  LabShareDAO Mirror Node v{}", crate::VERSION);
        info!("  Network: {}", config.chain.network);
        info!("===========================================");

        let outcome = self.container.bootstrapper()?.run().await?;
        info!(?outcome, "Mirror ready");

        self.container.ingestor.start_listening().await?;
        self.spawn_monitor();

        info!("RPC: {}", config.chain.chain_rpc_url);
        info!("Events: {:?}", self.container.filter);
        info!("Store: {:?} at {:?}", config.store.backend, config.store.path);
        Ok(outcome)
    }

    /// Log every ingestor state change until shutdown.
    fn spawn_monitor(&self) {
        let ingestor = Arc::clone(&self.container.ingestor);
        let mut states = ingestor.watch_state();
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        match state {
                            IngestorState::Reconnecting => {
                                warn!(attempt = ingestor.status().attempt_count, "[ls-05] Ingestor reconnecting");
                            }
                            IngestorState::Stopped => match ingestor.last_error() {
                                Some(e) => error!(error = %e, kind = %e.kind(), "[ls-05] Ingestor stopped"),
                                None => info!("[ls-05] Ingestor stopped"),
                            },
                            other => info!(state = %other, "[ls-05] Ingestor state"),
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[ls-05] Shutdown signal received");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the node gracefully.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        self.container.ingestor.stop_listening().await;
        info!("Shutdown complete");
    }

    /// The subsystem container.
    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }
}
