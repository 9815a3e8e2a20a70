//! # Derived Proposal Status

use serde::{Deserialize, Serialize};
use shared_types::TimestampMs;
use std::fmt;
use std::str::FromStr;

use super::entities::Proposal;

/// Status computed from `executed`, `approved` and the voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Not executed, voting window open.
    Active,
    /// Not executed, voting window closed.
    Expired,
    /// Executed and approved.
    ExecutedApproved,
    /// Executed and rejected.
    ExecutedRejected,
}

impl ProposalStatus {
    /// Derive the status of `proposal` at `now`.
    pub fn derive(proposal: &Proposal, now: TimestampMs) -> Self {
        match (proposal.executed, proposal.approved) {
            (true, Some(true)) => ProposalStatus::ExecutedApproved,
            (true, _) => ProposalStatus::ExecutedRejected,
            (false, _) if now < proposal.voting_end_time => ProposalStatus::Active,
            (false, _) => ProposalStatus::Expired,
        }
    }

    /// Snake-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Expired => "expired",
            ProposalStatus::ExecutedApproved => "executed_approved",
            ProposalStatus::ExecutedRejected => "executed_rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProposalStatus::Active),
            "expired" => Ok(ProposalStatus::Expired),
            "executed_approved" => Ok(ProposalStatus::ExecutedApproved),
            "executed_rejected" => Ok(ProposalStatus::ExecutedRejected),
            other => Err(format!("unknown proposal status '{other}'")),
        }
    }
}
