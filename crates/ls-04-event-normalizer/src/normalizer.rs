//! # Normalizer
//!
//! `normalize()` maps a [`RawEvent`] onto [`NormalizedEvent`] by the event
//! name (the segment after the last `::` of the Move type).

use ls_01_chain_client::RawEvent;
use shared_types::serde_helpers::{narrow_u64, parse_big_uint};
use shared_types::{ProposalType, TimestampMs};
use tracing::debug;

use crate::domain::{
    AlertTriggered, DataRecordCreated, MemberAdded, NormalizeError, NormalizedEnvelope,
    NormalizedEvent, ProposalCreated, ProposalExecuted, VoteCast,
};
use crate::fields::Payload;

/// Parse a millisecond timestamp literal of any size, rejecting values
/// that do not fit a `u64`.
pub fn parse_timestamp(literal: &str) -> Result<TimestampMs, NormalizeError> {
    let big = parse_big_uint(literal).map_err(|e| NormalizeError::InvalidTimestamp(e.to_string()))?;
    narrow_u64(big).map_err(|e| NormalizeError::InvalidTimestamp(e.to_string()))
}

/// Normalize one envelope.
///
/// The event time is the payload's `timestamp` when the contract emits
/// one, otherwise the envelope's `timestampMs`.
pub fn normalize(raw: &RawEvent) -> Result<NormalizedEnvelope, NormalizeError> {
    let name = raw.kind_name();
    let payload = Payload::new(name, &raw.parsed_json);

    let timestamp_ms = match payload.big_uint(&["timestamp", "timestamp_ms"])? {
        Some(big) => narrow_u64(big).map_err(|e| NormalizeError::InvalidTimestamp(e.to_string()))?,
        None => match raw.timestamp_ms.as_deref() {
            Some(literal) => parse_timestamp(literal)?,
            None => {
                return Err(NormalizeError::InvalidTimestamp(format!(
                    "event {} carries no timestamp",
                    raw.id
                )))
            }
        },
    };

    let event = match name {
        "MemberAdded" => NormalizedEvent::MemberAdded(MemberAdded {
            member: payload.address(&["member", "member_address", "addr"])?,
            name: payload.string(&["name"])?,
            voting_power: payload.u64(&["voting_power", "power"])?,
        }),
        "DataRecordCreated" => NormalizedEvent::DataRecordCreated(DataRecordCreated {
            record_id: payload.address(&["record_id", "object_id"])?,
            seq_id: payload.u64(&["data_id", "seq_id", "id"])?,
            sensor_type: payload.u8(&["sensor_type"])?,
            submitter: payload.address(&["submitter"])?,
            value: payload.u64(&["value"])?,
            triggered_alert: payload.opt_bool(&["triggered_alert"])?.unwrap_or(false),
        }),
        "ProposalCreated" => {
            let raw_type = payload.u64(&["proposal_type", "type"])?;
            let proposal_type = ProposalType::try_from(raw_type).map_err(|e| {
                NormalizeError::InvalidField {
                    kind: name.to_string(),
                    field: "proposal_type".to_string(),
                    reason: e.to_string(),
                }
            })?;
            NormalizedEvent::ProposalCreated(ProposalCreated {
                proposal_id: payload.address(&["proposal_id", "object_id"])?,
                seq_id: payload.u64(&["proposal_number", "seq_id", "id"])?,
                proposal_type,
                title: payload.string(&["title"])?,
                proposer: payload.address(&["proposer"])?,
            })
        }
        "VoteCast" => NormalizedEvent::VoteCast(VoteCast {
            proposal_id: payload.address(&["proposal_id"])?,
            voter: payload.address(&["voter"])?,
            vote: payload.bool(&["vote", "support"])?,
            voting_power: payload.u64(&["voting_power", "power"])?,
        }),
        "ProposalExecuted" => NormalizedEvent::ProposalExecuted(ProposalExecuted {
            proposal_id: payload.address(&["proposal_id"])?,
            approved: payload.bool(&["approved"])?,
            yes_votes: payload.u64(&["yes_votes", "final_yes"])?,
            no_votes: payload.u64(&["no_votes", "final_no"])?,
        }),
        "AlertTriggered" => NormalizedEvent::AlertTriggered(AlertTriggered {
            record_id: payload.address(&["record_id", "data_record_id"])?,
            sensor_type: payload.u8(&["sensor_type"])?,
            value: payload.u64(&["value"])?,
            threshold: payload.opt_u64(&["threshold"])?,
            proposal_id: payload.address(&["proposal_id"])?,
        }),
        other => {
            debug!(event_id = %raw.id, "[ls-04] ignoring unknown event kind {}", other);
            NormalizedEvent::Unknown {
                name: other.to_string(),
            }
        }
    };

    Ok(NormalizedEnvelope {
        id: raw.id.clone(),
        timestamp_ms,
        event,
        raw: raw.clone(),
    })
}
