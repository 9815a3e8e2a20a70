//! Storage key layout.
//!
//! ```text
//! dao                               -> Dao
//! meta/initialized                  -> true
//! meta/processed_total              -> u64
//! member/<addr>                     -> MemberLink
//! member_user/<user_id>             -> addr
//! member_pending/<addr>             -> PendingMember
//! proposal/<id>                     -> Proposal
//! proposal_seq/<seq:020>            -> id
//! record/<id>                       -> DataRecord
//! record_seq/<seq:020>              -> id
//! record_alert/<proposal id>        -> record id
//! pending_alert/<record id>         -> PendingAlertLink
//! sensor/<id:003>                   -> SensorType
//! threshold/<id:003>                -> ThresholdConfig
//! processed/<event key>             -> ProcessedEvent
//! processed_ring/<slot:020>         -> event key
//! dead_letter/<event key>           -> DeadLetter
//! deferred/<entity>/<event key>     -> DeferredEvent
//! idx/<family>/<value>/<id>         -> id
//! ```
//!
//! Secondary index families (`idx/`), one entry per indexed value:
//!
//! | Family | Value |
//! |--------|-------|
//! | `proposal_type` | type code |
//! | `proposal_executed` | `0` / `1` |
//! | `proposal_proposer` | address |
//! | `proposal_created` | `createdAt`, zero-padded |
//! | `proposal_end` | `votingEndTime`, zero-padded |
//! | `proposal_voter` | voter address, one entry per voter |
//! | `proposal_data_ref` | data record id |
//! | `record_sensor` | sensor type id |
//! | `record_submitter` | address |
//! | `record_time` | `timestamp`, zero-padded |
//! | `record_alert_flag` | `0` / `1` |
//! | `member_is` | `0` / `1` |

use shared_types::{ChainAddress, ObjectId, TimestampMs};

use crate::domain::{DataRecord, MemberLink, Proposal};

pub(crate) const DAO: &str = "dao";
pub(crate) const INITIALIZED: &str = "meta/initialized";
pub(crate) const PROCESSED_TOTAL: &str = "meta/processed_total";

pub(crate) const MEMBER_PREFIX: &str = "member/";
pub(crate) const PENDING_MEMBER_PREFIX: &str = "member_pending/";
pub(crate) const PROPOSAL_PREFIX: &str = "proposal/";
pub(crate) const RECORD_PREFIX: &str = "record/";
pub(crate) const PENDING_ALERT_PREFIX: &str = "pending_alert/";
pub(crate) const SENSOR_PREFIX: &str = "sensor/";
pub(crate) const THRESHOLD_PREFIX: &str = "threshold/";
pub(crate) const DEAD_LETTER_PREFIX: &str = "dead_letter/";

pub(crate) fn member(addr: &ChainAddress) -> String {
    format!("{MEMBER_PREFIX}{addr}")
}

pub(crate) fn member_user(user_id: &str) -> String {
    format!("member_user/{user_id}")
}

pub(crate) fn pending_member(addr: &ChainAddress) -> String {
    format!("{PENDING_MEMBER_PREFIX}{addr}")
}

pub(crate) fn proposal(id: &ObjectId) -> String {
    format!("{PROPOSAL_PREFIX}{id}")
}

pub(crate) fn proposal_seq(seq: u64) -> String {
    format!("proposal_seq/{seq:020}")
}

pub(crate) fn record(id: &ObjectId) -> String {
    format!("{RECORD_PREFIX}{id}")
}

pub(crate) fn record_seq(seq: u64) -> String {
    format!("record_seq/{seq:020}")
}

pub(crate) fn record_alert(proposal: &ObjectId) -> String {
    format!("record_alert/{proposal}")
}

pub(crate) fn pending_alert(record: &ObjectId) -> String {
    format!("{PENDING_ALERT_PREFIX}{record}")
}

pub(crate) fn sensor(id: u8) -> String {
    format!("{SENSOR_PREFIX}{id:03}")
}

pub(crate) fn threshold(id: u8) -> String {
    format!("{THRESHOLD_PREFIX}{id:03}")
}

pub(crate) fn processed(event_key: &str) -> String {
    format!("processed/{event_key}")
}

pub(crate) fn processed_ring(slot: u64) -> String {
    format!("processed_ring/{slot:020}")
}

pub(crate) fn dead_letter(event_key: &str) -> String {
    format!("{DEAD_LETTER_PREFIX}{event_key}")
}

pub(crate) fn deferred_prefix(entity: &str) -> String {
    format!("deferred/{entity}/")
}

pub(crate) fn deferred(entity: &str, event_key: &str) -> String {
    format!("deferred/{entity}/{event_key}")
}

// =============================================================================
// SECONDARY INDICES
// =============================================================================

pub(crate) const IDX_PROPOSAL_TYPE: &str = "proposal_type";
pub(crate) const IDX_PROPOSAL_EXECUTED: &str = "proposal_executed";
pub(crate) const IDX_PROPOSAL_PROPOSER: &str = "proposal_proposer";
pub(crate) const IDX_PROPOSAL_CREATED: &str = "proposal_created";
pub(crate) const IDX_PROPOSAL_END: &str = "proposal_end";
pub(crate) const IDX_PROPOSAL_VOTER: &str = "proposal_voter";
pub(crate) const IDX_PROPOSAL_DATA_REF: &str = "proposal_data_ref";
pub(crate) const IDX_RECORD_SENSOR: &str = "record_sensor";
pub(crate) const IDX_RECORD_SUBMITTER: &str = "record_submitter";
pub(crate) const IDX_RECORD_TIME: &str = "record_time";
pub(crate) const IDX_RECORD_ALERT_FLAG: &str = "record_alert_flag";
pub(crate) const IDX_MEMBER_IS: &str = "member_is";

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn time(ms: TimestampMs) -> String {
    format!("{ms:020}")
}

pub(crate) fn index(family: &str, value: &str, id: &str) -> String {
    format!("idx/{family}/{value}/{id}")
}

/// Entries of `family` holding `value`.
pub(crate) fn index_prefix(family: &str, value: &str) -> String {
    format!("idx/{family}/{value}/")
}

/// Every entry of `family`.
pub(crate) fn index_family(family: &str) -> String {
    format!("idx/{family}/")
}

pub(crate) fn index_flag(family: &str, value: bool) -> String {
    index_prefix(family, flag(value))
}

pub(crate) fn index_sensor(sensor_type: u8) -> String {
    index_prefix(IDX_RECORD_SENSOR, &format!("{sensor_type:03}"))
}

/// Split an index key under `family` into its value and id.
pub(crate) fn parse_index<'k>(family: &str, key: &'k str) -> Option<(&'k str, &'k str)> {
    key.strip_prefix("idx/")?
        .strip_prefix(family)?
        .strip_prefix('/')?
        .split_once('/')
}

pub(crate) fn proposal_indices(p: &Proposal) -> Vec<String> {
    let id = p.object_id.as_str();
    let mut keys = vec![
        index(IDX_PROPOSAL_TYPE, &p.proposal_type.as_u8().to_string(), id),
        index(IDX_PROPOSAL_EXECUTED, flag(p.executed), id),
        index(IDX_PROPOSAL_PROPOSER, p.proposer.as_str(), id),
        index(IDX_PROPOSAL_CREATED, &time(p.created_at), id),
        index(IDX_PROPOSAL_END, &time(p.voting_end_time), id),
    ];
    keys.extend(
        p.voters
            .iter()
            .map(|v| index(IDX_PROPOSAL_VOTER, v.addr.as_str(), id)),
    );
    if let Some(data_ref) = &p.data_ref {
        keys.push(index(IDX_PROPOSAL_DATA_REF, data_ref.as_str(), id));
    }
    keys
}

pub(crate) fn record_indices(r: &DataRecord) -> Vec<String> {
    let id = r.object_id.as_str();
    vec![
        index(IDX_RECORD_SENSOR, &format!("{:03}", r.sensor_type), id),
        index(IDX_RECORD_SUBMITTER, r.submitter.as_str(), id),
        index(IDX_RECORD_TIME, &time(r.timestamp), id),
        index(IDX_RECORD_ALERT_FLAG, flag(r.triggered_alert), id),
    ]
}

pub(crate) fn member_indices(m: &MemberLink) -> Vec<String> {
    vec![index(IDX_MEMBER_IS, flag(m.is_member), m.addr.as_str())]
}
