//! # Normalized Events
//!
//! One payload struct per contract event, wrapped in [`NormalizedEvent`].

use ls_01_chain_client::RawEvent;
use serde::{Deserialize, Serialize};
use shared_types::{ChainAddress, EventCursor, EventId, ObjectId, ProposalType, TimestampMs};
use std::fmt;

/// A member was added to the DAO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAdded {
    /// Member address.
    pub member: ChainAddress,
    /// Display name.
    pub name: String,
    /// Voting weight.
    pub voting_power: u64,
}

/// A sensor data record was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecordCreated {
    /// Record object id.
    pub record_id: ObjectId,
    /// Sequential data id assigned by the DAO.
    pub seq_id: u64,
    /// Sensor type.
    pub sensor_type: u8,
    /// Submitting address.
    pub submitter: ChainAddress,
    /// Measured value.
    pub value: u64,
    /// Whether the value breached the threshold.
    pub triggered_alert: bool,
}

/// A proposal was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCreated {
    /// Proposal object id.
    pub proposal_id: ObjectId,
    /// Sequential proposal id assigned by the DAO.
    pub seq_id: u64,
    /// Proposal category.
    pub proposal_type: ProposalType,
    /// Title.
    pub title: String,
    /// Creating address.
    pub proposer: ChainAddress,
}

/// A vote was cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCast {
    /// Proposal object id.
    pub proposal_id: ObjectId,
    /// Voting address.
    pub voter: ChainAddress,
    /// `true` for yes.
    pub vote: bool,
    /// Weight of the vote.
    pub voting_power: u64,
}

/// A proposal was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalExecuted {
    /// Proposal object id.
    pub proposal_id: ObjectId,
    /// Outcome as decided on chain.
    pub approved: bool,
    /// Final yes tally.
    pub yes_votes: u64,
    /// Final no tally.
    pub no_votes: u64,
}

/// A data record breached its threshold and an alert proposal was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTriggered {
    /// Record object id.
    pub record_id: ObjectId,
    /// Sensor type.
    pub sensor_type: u8,
    /// Measured value.
    pub value: u64,
    /// Threshold bound that was crossed, when reported.
    pub threshold: Option<u64>,
    /// Alert proposal object id.
    pub proposal_id: ObjectId,
}

/// Closed set of events the mirror understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedEvent {
    /// See [`MemberAdded`].
    MemberAdded(MemberAdded),
    /// See [`DataRecordCreated`].
    DataRecordCreated(DataRecordCreated),
    /// See [`ProposalCreated`].
    ProposalCreated(ProposalCreated),
    /// See [`VoteCast`].
    VoteCast(VoteCast),
    /// See [`ProposalExecuted`].
    ProposalExecuted(ProposalExecuted),
    /// See [`AlertTriggered`].
    AlertTriggered(AlertTriggered),
    /// Any other event emitted by the package.
    Unknown {
        /// The event name.
        name: String,
    },
}

/// Serialization key for one mirror entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// A member address.
    Member(ChainAddress),
    /// A proposal object.
    Proposal(ObjectId),
    /// A data record object.
    Record(ObjectId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Member(a) => write!(f, "member:{a}"),
            EntityKey::Proposal(id) => write!(f, "proposal:{id}"),
            EntityKey::Record(id) => write!(f, "record:{id}"),
        }
    }
}

impl NormalizedEvent {
    /// Snake-case label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            NormalizedEvent::MemberAdded(_) => "member_added",
            NormalizedEvent::DataRecordCreated(_) => "data_record_created",
            NormalizedEvent::ProposalCreated(_) => "proposal_created",
            NormalizedEvent::VoteCast(_) => "vote_cast",
            NormalizedEvent::ProposalExecuted(_) => "proposal_executed",
            NormalizedEvent::AlertTriggered(_) => "alert_triggered",
            NormalizedEvent::Unknown { .. } => "unknown",
        }
    }

    /// The entity whose events must be applied one at a time.
    ///
    /// An alert is keyed by its data record: the record side owns the
    /// pending link.
    pub fn entity(&self) -> Option<EntityKey> {
        match self {
            NormalizedEvent::MemberAdded(e) => Some(EntityKey::Member(e.member.clone())),
            NormalizedEvent::DataRecordCreated(e) => Some(EntityKey::Record(e.record_id.clone())),
            NormalizedEvent::ProposalCreated(e) => Some(EntityKey::Proposal(e.proposal_id.clone())),
            NormalizedEvent::VoteCast(e) => Some(EntityKey::Proposal(e.proposal_id.clone())),
            NormalizedEvent::ProposalExecuted(e) => {
                Some(EntityKey::Proposal(e.proposal_id.clone()))
            }
            NormalizedEvent::AlertTriggered(e) => Some(EntityKey::Record(e.record_id.clone())),
            NormalizedEvent::Unknown { .. } => None,
        }
    }
}

/// A normalized event with its stream position and the envelope it came
/// from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEnvelope {
    /// Chain event id.
    pub id: EventId,
    /// Event time in milliseconds.
    pub timestamp_ms: TimestampMs,
    /// Typed payload.
    pub event: NormalizedEvent,
    /// Source envelope, kept for dead letters and deferral.
    pub raw: RawEvent,
}

impl NormalizedEnvelope {
    /// Stream position of this event.
    pub fn cursor(&self) -> EventCursor {
        EventCursor::new(self.id.clone(), self.timestamp_ms)
    }
}
