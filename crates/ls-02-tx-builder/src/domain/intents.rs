//! # Intents
//!
//! One input struct per user action, in the shape the route layer
//! receives them. Addresses are plain strings here; the builder
//! canonicalizes them.

use serde::{Deserialize, Serialize};

/// Bounds for free-text fields.
pub mod limits {
    /// Member display name.
    pub const NAME_MAX: usize = 64;
    /// Proposal title.
    pub const TITLE_MAX: usize = 200;
    /// Proposal description.
    pub const DESCRIPTION_MAX: usize = 5_000;
    /// Data record metadata.
    pub const METADATA_MAX: usize = 2_000;
    /// Milestone description.
    pub const MILESTONE_DESCRIPTION_MAX: usize = 500;
    /// Data hash, in hex digits.
    pub const DATA_HASH_HEX_MAX: usize = 128;
    /// Shortest voting period (1 hour).
    pub const VOTING_PERIOD_MIN_MS: u64 = 3_600_000;
    /// Longest voting period (30 days).
    pub const VOTING_PERIOD_MAX_MS: u64 = 30 * 86_400_000;
    /// Milestones per escrow.
    pub const MILESTONES_MAX: usize = 20;
}

/// Admin adds a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberIntent {
    /// Signing admin.
    pub sender: String,
    /// New member address.
    pub member: String,
    /// Display name.
    pub name: String,
    /// Voting weight.
    pub voting_power: u64,
}

/// Member submits a sensor reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDataIntent {
    /// Submitting member.
    pub sender: String,
    /// Sensor type id (0..=255).
    pub sensor_type: u64,
    /// Measured value.
    pub value: u64,
    /// Hash of the off-chain payload, hex.
    pub data_hash: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: String,
}

/// Threshold change carried by a configuration proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdChange {
    /// Sensor type id.
    pub sensor_type: u64,
    /// New lower bound.
    pub min_value: u64,
    /// New upper bound.
    pub max_value: u64,
}

/// Member opens a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalIntent {
    /// Proposing member.
    pub sender: String,
    /// Numeric proposal type.
    pub proposal_type: u64,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Voting window length.
    pub voting_period_ms: u64,
    /// Required for configuration proposals, forbidden otherwise.
    #[serde(default)]
    pub config_change: Option<ThresholdChange>,
}

/// Member votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteIntent {
    /// Voting member.
    pub sender: String,
    /// Proposal object id.
    pub proposal_id: String,
    /// `true` for yes.
    pub vote: bool,
}

/// Anyone executes a proposal whose voting window closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteProposalIntent {
    /// Executing address.
    pub sender: String,
    /// Proposal object id.
    pub proposal_id: String,
}

/// Admin sets a threshold directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThresholdIntent {
    /// Signing admin.
    pub sender: String,
    /// Sensor type id.
    pub sensor_type: u64,
    /// Lower bound.
    pub min_value: u64,
    /// Upper bound.
    pub max_value: u64,
}

/// Deposit into the DAO treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFundsIntent {
    /// Depositor.
    pub sender: String,
    /// Coin object to draw from.
    pub coin_object_id: String,
    /// Decimal amount, e.g. `"2.5"`.
    pub amount: String,
}

/// One escrow milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneInput {
    /// What must be delivered.
    pub description: String,
    /// Decimal amount released on completion.
    pub amount: String,
}

/// Fund an escrow for a beneficiary, released per milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscrowIntent {
    /// Payer.
    pub sender: String,
    /// Recipient of released funds.
    pub beneficiary: String,
    /// Coin object to draw from.
    pub coin_object_id: String,
    /// Decimal total.
    pub amount: String,
    /// Milestones; amounts must sum to the total.
    pub milestones: Vec<MilestoneInput>,
}

/// Payer approves a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMilestoneIntent {
    /// Payer.
    pub sender: String,
    /// Escrow object id.
    pub escrow_id: String,
    /// Zero-based milestone index.
    pub milestone_index: u64,
}

/// Release funds for an approved milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMilestoneIntent {
    /// Caller.
    pub sender: String,
    /// Escrow object id.
    pub escrow_id: String,
    /// Zero-based milestone index.
    pub milestone_index: u64,
}

/// Return unreleased funds to the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundEscrowIntent {
    /// Payer.
    pub sender: String,
    /// Escrow object id.
    pub escrow_id: String,
}
