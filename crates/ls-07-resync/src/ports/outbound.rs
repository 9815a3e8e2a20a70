//! # Outbound Ports

pub use ls_01_chain_client::ChainClient;
pub use ls_03_mirror_store::MirrorStore;
pub use ls_06_mirror_applier::EventApplier;
pub use shared_types::Clock;
