//! # Chain Object Decoding
//!
//! Builds mirror entities from on-chain objects. Field names follow the
//! contract; where the contract has renamed a field across versions each
//! accepted spelling is listed.

use ls_01_chain_client::{ChainClientError, ObjectFields};
use ls_03_mirror_store::{ConfigChange, Dao, DataRecord, Proposal};
use ls_04_event_normalizer::{DataRecordCreated, ProposalCreated};
use shared_types::{ChainAddress, ProposalType, TimestampMs};

use super::errors::ApplyError;

fn first_u64(obj: &ObjectFields, names: &[&str]) -> Result<Option<u64>, ChainClientError> {
    for name in names {
        if let Some(v) = obj.opt_u64(name)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn first_address(
    obj: &ObjectFields,
    names: &[&str],
) -> Result<Option<ChainAddress>, ChainClientError> {
    for name in names {
        if let Some(a) = obj.opt_address(name)? {
            return Ok(Some(a));
        }
    }
    Ok(None)
}

fn require<T>(value: Option<T>, obj: &ObjectFields, field: &str) -> Result<T, ApplyError> {
    value.ok_or_else(|| {
        ApplyError::Chain(ChainClientError::Decode(format!(
            "object {} has no field '{}'",
            obj.object_id, field
        )))
    })
}

fn small(obj: &ObjectFields, field: &str, value: Option<u64>) -> Result<Option<u8>, ApplyError> {
    value
        .map(|v| {
            u8::try_from(v).map_err(|_| {
                ApplyError::Chain(ChainClientError::Decode(format!(
                    "object {} field '{}': {} exceeds u8",
                    obj.object_id, field, v
                )))
            })
        })
        .transpose()
}

/// Proposal from its chain object.
///
/// When the creation event is at hand its identity fields win over the
/// object's. Tallies and voters start empty: votes are mirrored from
/// `VoteCast` events only, so they are never counted twice.
pub fn proposal_from_object(
    obj: &ObjectFields,
    created: Option<&ProposalCreated>,
    created_at: TimestampMs,
) -> Result<Proposal, ApplyError> {
    let (seq_id, proposal_type, title, proposer) = match created {
        Some(e) => (e.seq_id, e.proposal_type, e.title.clone(), e.proposer.clone()),
        None => {
            let seq = require(first_u64(obj, &["proposal_number", "seq_id"])?, obj, "proposal_number")?;
            let raw_type = obj.u64("proposal_type")?;
            let kind = ProposalType::try_from(raw_type)
                .map_err(|e| ApplyError::Invariant(format!("proposal {}: {}", obj.object_id, e)))?;
            (seq, kind, obj.string("title")?, obj.address("proposer")?)
        }
    };

    let config_change = match (
        small(obj, "config_sensor_type", obj.opt_u64("config_sensor_type")?)?,
        obj.opt_u64("config_min")?,
        obj.opt_u64("config_max")?,
    ) {
        (Some(sensor_type), Some(min_value), Some(max_value)) => Some(ConfigChange {
            sensor_type,
            min_value,
            max_value,
        }),
        _ => None,
    };

    let proposal = Proposal {
        object_id: obj.object_id.clone(),
        seq_id,
        proposal_type,
        title,
        description: obj.opt_string("description")?.unwrap_or_default(),
        proposer,
        created_at,
        voting_end_time: require(
            first_u64(obj, &["voting_end_time", "voting_deadline", "end_time"])?,
            obj,
            "voting_end_time",
        )?,
        executed: false,
        approved: None,
        executed_at: None,
        yes_votes: 0,
        no_votes: 0,
        voters: Vec::new(),
        data_ref: first_address(obj, &["data_record_id", "data_ref"])?,
        alert_value: obj.opt_u64("alert_value")?,
        alert_sensor: small(
            obj,
            "alert_sensor_type",
            first_u64(obj, &["alert_sensor_type", "alert_sensor"])?,
        )?,
        config_change,
        version: 0,
    };

    if proposal.proposal_type == ProposalType::Alert
        && (proposal.data_ref.is_none()
            || proposal.alert_value.is_none()
            || proposal.alert_sensor.is_none())
    {
        return Err(ApplyError::Invariant(format!(
            "alert proposal {} lacks its data record linkage",
            proposal.object_id
        )));
    }
    Ok(proposal)
}

/// Data record from its creation event plus the chain object's hash and
/// metadata, which the event does not always carry.
pub fn data_record_from_object(
    obj: &ObjectFields,
    created: &DataRecordCreated,
    timestamp: TimestampMs,
) -> Result<DataRecord, ApplyError> {
    Ok(DataRecord {
        object_id: created.record_id.clone(),
        seq_id: created.seq_id,
        sensor_type: created.sensor_type,
        submitter: created.submitter.clone(),
        data_hash: obj.opt_bytes_hex("data_hash")?.unwrap_or_default(),
        metadata: obj.opt_string("metadata")?.unwrap_or_default(),
        timestamp,
        value: created.value,
        triggered_alert: created.triggered_alert,
        alert_proposal: None,
        version: 0,
    })
}

/// Treasury balance of the DAO object in base units.
pub fn treasury_balance(obj: &ObjectFields) -> Result<Option<u64>, ApplyError> {
    Ok(first_u64(obj, &["treasury_balance", "treasury"])?)
}

/// DAO singleton from the chain's DAO object.
///
/// `member_count` starts at zero: it counts linked members in the mirror
/// and grows as `MemberAdded` events meet linked addresses.
pub fn dao_from_object(obj: &ObjectFields) -> Result<Dao, ApplyError> {
    let admin = require(first_address(obj, &["admin", "admin_address"])?, obj, "admin")?;
    let mut dao = Dao::new(
        obj.object_id.clone(),
        obj.opt_string("name")?.unwrap_or_default(),
        admin,
    );
    dao.description = obj.opt_string("description")?.unwrap_or_default();
    dao.treasury_balance = treasury_balance(obj)?.unwrap_or(0);
    dao.next_proposal_id = obj.opt_u64("next_proposal_id")?.unwrap_or(1).max(1);
    dao.next_data_id = obj.opt_u64("next_data_id")?.unwrap_or(1).max(1);
    Ok(dao)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::ObjectId;

    fn obj(fields: serde_json::Value) -> ObjectFields {
        ObjectFields::from_json(ObjectId::parse("0xe1").unwrap(), 4, fields)
    }

    #[test]
    fn test_proposal_without_event_reads_object() {
        let p = proposal_from_object(
            &obj(json!({
                "proposal_number": "7",
                "proposal_type": 2,
                "title": "Raise CO2 ceiling",
                "description": "Lab B runs hot",
                "proposer": "0x1",
                "voting_deadline": "9000",
                "config_sensor_type": 2,
                "config_min": "400",
                "config_max": "1200",
                "yes_votes": "50"
            })),
            None,
            100,
        )
        .unwrap();

        assert_eq!(p.seq_id, 7);
        assert_eq!(p.proposal_type, ProposalType::Configuration);
        assert_eq!(p.voting_end_time, 9000);
        assert_eq!(p.yes_votes, 0);
        assert_eq!(
            p.config_change,
            Some(ConfigChange {
                sensor_type: 2,
                min_value: 400,
                max_value: 1200
            })
        );
    }

    #[test]
    fn test_alert_proposal_requires_linkage() {
        let err = proposal_from_object(
            &obj(json!({
                "proposal_number": 3,
                "proposal_type": 1,
                "title": "Alert",
                "proposer": "0x1",
                "voting_end_time": 10
            })),
            None,
            0,
        )
        .unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::Validation);
    }

    #[test]
    fn test_dao_reads_wrapped_treasury() {
        let dao = dao_from_object(&obj(json!({
            "name": "LabShareDAO",
            "admin": "0xad",
            "treasury": {"type": "0x2::balance::Balance<0x2::sui::SUI>", "fields": {"value": "2500"}},
            "member_count": "12",
            "next_proposal_id": "4"
        })))
        .unwrap();

        assert_eq!(dao.treasury_balance, 2500);
        assert_eq!(dao.member_count, 0);
        assert_eq!(dao.next_proposal_id, 4);
        assert_eq!(dao.next_data_id, 1);
    }
}
