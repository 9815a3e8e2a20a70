//! # LabShareDAO Mirror Node
//!
//! Command-line entry point.
//!
//! ```text
//! labshare-node run                                  # bootstrap + live ingestion
//! labshare-node sync-recent --hours 24               # replay a time window
//! labshare-node sync-cursor --tx-digest D --event-seq S
//! labshare-node sync-cursor                          # replay the whole stream
//! labshare-node bootstrap                            # seed the mirror and exit
//! ```
//!
//! Configuration comes from `LSD_*` environment variables; the global flags
//! below override them.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use labshare_telemetry::{init_telemetry, TelemetryConfig};
use ls_05_event_ingestor::{EventIngestorApi, IngestorState};
use node_runtime::{NodeConfig, NodeRuntime, SubsystemContainer};
use shared_types::{EventId, Network, ObjectId};

/// LabShareDAO mirror node
#[derive(Parser, Debug)]
#[command(name = "labshare-node", version)]
#[command(about = "Mirrors LabShareDAO chain state and prepares unsigned transactions")]
struct Args {
    /// Chain JSON-RPC endpoint (overrides LSD_CHAIN_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Network tag; also selects its default endpoint unless --rpc-url is given
    #[arg(long, global = true)]
    network: Option<Network>,

    /// Contract package id (overrides LSD_PACKAGE_ID)
    #[arg(long, global = true)]
    package_id: Option<ObjectId>,

    /// DAO object id (overrides LSD_DAO_OBJECT_ID)
    #[arg(long, global = true)]
    dao_object_id: Option<ObjectId>,

    /// Mirror database directory (overrides LSD_STORE_PATH)
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Bootstrap, then ingest live events until Ctrl+C (default)
    Run,

    /// Replay events from the last H hours
    SyncRecent {
        /// Window length, 1..=168
        #[arg(long)]
        hours: u32,
    },

    /// Replay events after a cursor, or the whole stream without one
    SyncCursor {
        /// Cursor transaction digest
        #[arg(long, requires = "event_seq")]
        tx_digest: Option<String>,

        /// Cursor event sequence
        #[arg(long, requires = "tx_digest")]
        event_seq: Option<u64>,
    },

    /// Seed the DAO singleton and default sensors, then exit
    Bootstrap,
}

/// Environment first, then CLI flags.
fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = NodeConfig::from_env().context("Invalid LSD_* environment")?;

    if let Some(network) = args.network {
        config.chain.network = network;
        config.chain.chain_rpc_url = network.default_rpc_url().to_string();
    }
    if let Some(url) = &args.rpc_url {
        config.chain.chain_rpc_url = url.clone();
    }
    if let Some(id) = &args.package_id {
        config.chain.package_id = Some(id.clone());
    }
    if let Some(id) = &args.dao_object_id {
        config.chain.dao_object_id = Some(id.clone());
    }
    if let Some(path) = &args.store_path {
        config.store.path = path.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(container: SubsystemContainer) -> Result<()> {
    let runtime = NodeRuntime::new(container);
    runtime.start().await.context("Failed to start node")?;

    let ingestor = runtime.container().ingestor.clone();
    let mut states = ingestor.watch_state();

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
        _ = states.wait_for(|s| *s == IngestorState::Stopped) => {
            warn!("Ingestor stopped without a shutdown request");
        }
    }

    runtime.shutdown().await;

    match ingestor.last_error() {
        Some(e) => Err(anyhow!(e).context("Ingestor stopped")),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("Failed to initialize telemetry")?;

    let config = load_config(&args)?;
    let container = SubsystemContainer::new(config).context("Failed to build subsystem container")?;

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(container).await,
        Command::Bootstrap => {
            let outcome = container.bootstrapper()?.run().await?;
            info!(?outcome, "Bootstrap finished");
            Ok(())
        }
        Command::SyncRecent { hours } => {
            container.bootstrapper()?.run().await?;
            let report = container.control().sync_recent(hours).await?;
            println!("{report}");
            Ok(())
        }
        Command::SyncCursor {
            tx_digest,
            event_seq,
        } => {
            container.bootstrapper()?.run().await?;
            let cursor = tx_digest.zip(event_seq).map(|(digest, seq)| EventId::new(digest, seq));
            let report = container.control().sync_from_cursor(cursor).await?;
            println!("{report}");
            Ok(())
        }
    }
}
