//! # Outbound Ports
//!
//! The applier reads the chain through LS-01 and writes the mirror through
//! LS-03; both ports are owned by those subsystems.

pub use ls_01_chain_client::ChainClient;
pub use ls_03_mirror_store::MirrorStore;
pub use shared_types::Clock;
