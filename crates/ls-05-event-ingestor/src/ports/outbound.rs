//! # Outbound Ports

pub use ls_01_chain_client::{ChainClient, EventSubscription};
pub use ls_06_mirror_applier::EventApplier;
pub use ls_07_resync::ResyncApi;
pub use shared_types::Clock;
