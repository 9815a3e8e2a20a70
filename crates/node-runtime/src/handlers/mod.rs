//! Services consumed by the route layer: queries, commands and ingestor
//! control.

pub mod command;
pub mod control;
pub mod query;

pub use command::{CommandService, PreparedTransaction};
pub use control::IngestorControl;
pub use query::{BalanceSource, ListenerStatus, ProposalView, QueryService, TreasuryBalance};
