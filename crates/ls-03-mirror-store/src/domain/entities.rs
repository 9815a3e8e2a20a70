//! # Mirror Entities
//!
//! The denormalized view of on-chain DAO state. Versioned entities carry a
//! `version` used for optimistic concurrency: a write succeeds only if the
//! stored version still equals the one the writer read (0 = absent).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ChainAddress, ErrorKind, EventCursor, ObjectId, ProposalType, TimestampMs};

// =============================================================================
// DAO
// =============================================================================

/// The DAO singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dao {
    /// DAO object id.
    pub dao_id: ObjectId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Admin address.
    pub admin: ChainAddress,
    /// Members with `is_member = true`.
    pub member_count: u64,
    /// Cached treasury balance in base units. The chain is authoritative.
    pub treasury_balance: u64,
    /// When the treasury cache was last refreshed.
    #[serde(default)]
    pub treasury_refreshed_at: Option<TimestampMs>,
    /// Next proposal sequence id.
    pub next_proposal_id: u64,
    /// Next data record sequence id.
    pub next_data_id: u64,
    /// High-water mark of applied events.
    #[serde(default)]
    pub last_cursor: Option<EventCursor>,
    /// Optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl Dao {
    /// A fresh DAO record.
    pub fn new(dao_id: ObjectId, name: impl Into<String>, admin: ChainAddress) -> Self {
        Self {
            dao_id,
            name: name.into(),
            description: String::new(),
            admin,
            member_count: 0,
            treasury_balance: 0,
            treasury_refreshed_at: None,
            next_proposal_id: 1,
            next_data_id: 1,
            last_cursor: None,
            version: 0,
        }
    }

    /// Raise the cursor to `max(current, candidate)`. Returns whether it
    /// moved.
    pub fn advance_cursor(&mut self, candidate: &EventCursor) -> bool {
        let next = EventCursor::max_of(self.last_cursor.as_ref(), candidate);
        if self.last_cursor.as_ref() == Some(&next) {
            return false;
        }
        self.last_cursor = Some(next);
        true
    }
}

// =============================================================================
// MEMBERS
// =============================================================================

/// On-chain member details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    /// Display name.
    pub name: String,
    /// When the member was added.
    pub joined_at: TimestampMs,
    /// Voting weight.
    pub voting_power: u64,
}

/// Link between an application user and a chain address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLink {
    /// Application user id.
    pub user_id: String,
    /// Linked address.
    pub addr: ChainAddress,
    /// Whether the address is a DAO member on chain.
    pub is_member: bool,
    /// Filled when `is_member` becomes true.
    #[serde(default)]
    pub member_details: Option<MemberDetails>,
    /// When the link was created.
    pub linked_at: TimestampMs,
    /// Optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl MemberLink {
    /// A fresh, non-member link.
    pub fn new(user_id: impl Into<String>, addr: ChainAddress, linked_at: TimestampMs) -> Self {
        Self {
            user_id: user_id.into(),
            addr,
            is_member: false,
            member_details: None,
            linked_at,
            version: 0,
        }
    }
}

/// A member added on chain before any user linked the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMember {
    /// Member address.
    pub addr: ChainAddress,
    /// Details from the event.
    pub details: MemberDetails,
}

// =============================================================================
// SENSORS
// =============================================================================

/// A sensor category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorType {
    /// Sensor type id.
    pub sensor_type_id: u8,
    /// Display name.
    pub name: String,
    /// Whether submissions are accepted.
    pub active: bool,
}

/// Accepted range for one sensor type. `min_value < max_value` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    /// Sensor type id.
    pub sensor_type_id: u8,
    /// Lower bound.
    pub min_value: u64,
    /// Upper bound.
    pub max_value: u64,
    /// Description.
    pub description: String,
    /// Whether alerts are evaluated.
    pub active: bool,
    /// Last change.
    pub updated_at: TimestampMs,
    /// Optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl ThresholdConfig {
    /// Whether a value lies within `[min, max]`.
    pub fn contains(&self, value: u64) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }
}

// =============================================================================
// PROPOSALS
// =============================================================================

/// One recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    /// Voting address.
    pub addr: ChainAddress,
    /// `true` for yes.
    pub vote: bool,
    /// Weight.
    pub power: u64,
    /// When the vote was cast.
    pub voted_at: TimestampMs,
}

/// Threshold change proposed by a configuration proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChange {
    /// Sensor type id.
    pub sensor_type: u8,
    /// New lower bound.
    pub min_value: u64,
    /// New upper bound.
    pub max_value: u64,
}

/// A governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Proposal object id.
    pub object_id: ObjectId,
    /// Sequence id.
    pub seq_id: u64,
    /// Category.
    pub proposal_type: ProposalType,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Creating address.
    pub proposer: ChainAddress,
    /// Creation time.
    pub created_at: TimestampMs,
    /// End of the voting window.
    pub voting_end_time: TimestampMs,
    /// Whether the proposal was executed.
    pub executed: bool,
    /// Outcome, set on execution.
    #[serde(default)]
    pub approved: Option<bool>,
    /// Execution time.
    #[serde(default)]
    pub executed_at: Option<TimestampMs>,
    /// Yes tally.
    pub yes_votes: u64,
    /// No tally.
    pub no_votes: u64,
    /// Votes, unique by address.
    #[serde(default)]
    pub voters: Vec<Voter>,
    /// Data record that triggered an alert proposal.
    #[serde(default)]
    pub data_ref: Option<ObjectId>,
    /// Value that triggered an alert proposal.
    #[serde(default)]
    pub alert_value: Option<u64>,
    /// Sensor that triggered an alert proposal.
    #[serde(default)]
    pub alert_sensor: Option<u8>,
    /// Threshold change carried by a configuration proposal.
    #[serde(default)]
    pub config_change: Option<ConfigChange>,
    /// Optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl Proposal {
    /// Whether `addr` has voted.
    pub fn has_voter(&self, addr: &ChainAddress) -> bool {
        self.voters.iter().any(|v| &v.addr == addr)
    }

    /// Tallies recomputed from the voter list.
    pub fn recount(&self) -> (u64, u64) {
        self.voters.iter().fold((0, 0), |(yes, no), v| {
            if v.vote {
                (yes + v.power, no)
            } else {
                (yes, no + v.power)
            }
        })
    }
}

// =============================================================================
// DATA RECORDS
// =============================================================================

/// A sensor data submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecord {
    /// Record object id.
    pub object_id: ObjectId,
    /// Sequence id.
    pub seq_id: u64,
    /// Sensor type id.
    pub sensor_type: u8,
    /// Submitting address.
    pub submitter: ChainAddress,
    /// Hash of the off-chain payload, lowercase hex.
    pub data_hash: String,
    /// Free-form metadata.
    pub metadata: String,
    /// Submission time.
    pub timestamp: TimestampMs,
    /// Measured value.
    pub value: u64,
    /// Whether the value breached the threshold.
    pub triggered_alert: bool,
    /// Alert proposal, once linked.
    #[serde(default)]
    pub alert_proposal: Option<ObjectId>,
    /// Optimistic-concurrency version.
    #[serde(default)]
    pub version: u64,
}

/// Alert linkage observed before its data record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAlertLink {
    /// Record the alert belongs to.
    pub record_id: ObjectId,
    /// Alert proposal.
    pub proposal_id: ObjectId,
    /// Sensor type id.
    pub sensor_type: u8,
    /// Measured value.
    pub value: u64,
    /// Threshold bound that was crossed.
    pub threshold: Option<u64>,
    /// When the link was staged.
    pub staged_at: TimestampMs,
}

// =============================================================================
// PIPELINE BOOKKEEPING
// =============================================================================

/// Entry in the processed-event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEvent {
    /// `txDigest#eventSeq`.
    pub event_key: String,
    /// Event label.
    pub kind: String,
    /// When it was committed.
    pub processed_at: TimestampMs,
}

/// An event that exhausted its retry budget or can never apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// `txDigest#eventSeq`.
    pub event_key: String,
    /// Move event type.
    pub event_type: String,
    /// Raw envelope as received.
    pub raw_envelope: Value,
    /// Last error message.
    pub error: String,
    /// Last error category.
    pub error_kind: ErrorKind,
    /// Failed attempts.
    pub attempts: u32,
    /// First failure.
    pub first_failed_at: TimestampMs,
    /// Last failure.
    pub last_failed_at: TimestampMs,
}

/// An event parked until its entity can be fetched from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredEvent {
    /// Entity key the event waits on.
    pub entity: String,
    /// `txDigest#eventSeq`.
    pub event_key: String,
    /// Raw envelope as received.
    pub raw_envelope: Value,
    /// Why it was deferred.
    pub reason: String,
    /// When it was parked.
    pub deferred_at: TimestampMs,
}
