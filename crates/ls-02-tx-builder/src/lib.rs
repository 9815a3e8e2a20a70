//! # LS-02 Transaction Builder
//!
//! Pure, stateless construction of unsigned transactions for the DAO and
//! escrow contracts. No RPC calls and no signing happen here: callers get
//! base64 transaction bytes to hand to a wallet, plus an echo of the
//! canonicalized inputs.
//!
//! **Subsystem ID:** 02  
//! **Architecture:** Pure domain logic
//!
//! ## Validation
//!
//! | Input | Rule |
//! |-------|------|
//! | Addresses / object ids | canonical `0x` + 64 lowercase hex |
//! | `data_hash` | non-empty, even-length hex |
//! | Strings | per-field length bounds |
//! | Proposal type | `General` or `Configuration`; `Alert` is contract-only |
//! | Thresholds | `min < max` |
//! | Amounts | decimal strings with at most 9 fractional digits |
//!
//! ## Module Structure
//!
//! ```text
//! ls-02-tx-builder/
//! ├── domain/
//! │   ├── amount.rs    # base-unit conversion
//! │   ├── call.rs      # MoveCall, CallArg, wire encoding
//! │   ├── errors.rs    # BuildError
//! │   └── intents.rs   # one input struct per user action
//! ├── builder.rs       # TxBuilder
//! └── config.rs        # TxBuilderConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod domain;

pub use builder::TxBuilder;
pub use config::TxBuilderConfig;
pub use domain::{
    format_amount, parse_amount, AddFundsIntent, AddMemberIntent, ApproveMilestoneIntent,
    BuildError, BuiltTransaction, CallArg, CreateEscrowIntent, CreateProposalIntent,
    ExecuteProposalIntent, MilestoneInput, MoveCall, PureArg, RefundEscrowIntent,
    ReleaseMilestoneIntent, SubmitDataIntent, ThresholdChange, TransactionData,
    UpdateThresholdIntent, VoteIntent, BASE_UNITS_PER_COIN, COIN_DECIMALS,
};
