//! Test fixtures: a mock chain pre-loaded with the DAO object, plus
//! builders for the contract's events and objects.
//!
//! Used by this crate's tests and by the ingestor, resync and end-to-end
//! suites.

use ls_01_chain_client::{EventFilter, MockChainClient, ObjectFields, RawEvent};
use ls_03_mirror_store::{InMemoryMirrorStore, MirrorBatch, MirrorStore, MirrorWrite};
use serde_json::{json, Value};
use shared_types::{ChainAddress, EventId, ObjectId, ProposalType, TimestampMs};
use std::sync::Arc;

use crate::domain::{dao_from_object, ApplyError};

/// Deterministic address `0x…nn` with every byte set to `n`.
pub fn addr(n: u8) -> ChainAddress {
    ChainAddress::from_bytes([n; 32])
}

/// A mock chain with the LabShare package and DAO object.
pub struct ChainFixture {
    /// The mock chain.
    pub chain: Arc<MockChainClient>,
    /// Contract package.
    pub package: ObjectId,
    /// DAO object id.
    pub dao_id: ObjectId,
}

impl Default for ChainFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainFixture {
    /// Package `0xaa…`, DAO `0xda…` with admin `0xad…` and a treasury of 5 SUI.
    pub fn new() -> Self {
        let fixture = Self {
            chain: Arc::new(MockChainClient::new()),
            package: addr(0xaa),
            dao_id: addr(0xda),
        };
        fixture.set_treasury(5_000_000_000);
        fixture
    }

    /// Event filter for the DAO module.
    pub fn filter(&self) -> EventFilter {
        EventFilter::MoveModule {
            package: self.package.clone(),
            module: "dao".to_string(),
        }
    }

    /// Replace the DAO object with one holding `balance` base units.
    pub fn set_treasury(&self, balance: u64) {
        self.chain.put_object(ObjectFields::from_json(
            self.dao_id.clone(),
            1,
            json!({
                "name": "LabShareDAO",
                "description": "Shared lab instruments",
                "admin": addr(0xad).to_string(),
                "treasury": {"type": "0x2::balance::Balance<0x2::sui::SUI>", "fields": {"value": balance.to_string()}},
                "next_proposal_id": "1",
                "next_data_id": "1",
            }),
        ));
    }

    /// Write the DAO singleton read from the chain into `store`.
    pub async fn seed_dao(&self, store: &dyn MirrorStore) -> Result<(), ApplyError> {
        let object = ObjectFields::from_json(
            self.dao_id.clone(),
            1,
            json!({ "name": "LabShareDAO", "admin": addr(0xad).to_string() }),
        );
        let dao = dao_from_object(&object)?;
        store
            .commit(MirrorBatch::new().with(MirrorWrite::Dao(dao)))
            .await?;
        Ok(())
    }

    /// An in-memory mirror with the DAO seeded.
    pub async fn seeded_store(&self) -> Result<Arc<InMemoryMirrorStore>, ApplyError> {
        let store = Arc::new(InMemoryMirrorStore::in_memory());
        self.seed_dao(store.as_ref()).await?;
        Ok(store)
    }

    /// Raw event of `kind` from the DAO module.
    pub fn event(&self, kind: &str, tx: &str, ts: TimestampMs, payload: Value) -> RawEvent {
        RawEvent::new(
            format!("{}::dao::{}", self.package, kind),
            EventId::new(tx, 0),
            ts,
            payload,
        )
    }

    /// `MemberAdded`.
    pub fn member_added(&self, tx: &str, member: &ChainAddress, name: &str, power: u64, ts: TimestampMs) -> RawEvent {
        self.event(
            "MemberAdded",
            tx,
            ts,
            json!({ "member": member.to_string(), "name": name, "voting_power": power.to_string() }),
        )
    }

    /// Store a proposal object on chain.
    pub fn put_proposal(&self, id: &ObjectId, seq: u64, kind: ProposalType, title: &str, end: TimestampMs) {
        self.chain.put_object(ObjectFields::from_json(
            id.clone(),
            1,
            json!({
                "proposal_number": seq.to_string(),
                "proposal_type": kind.as_u8(),
                "title": title,
                "description": format!("{title} description"),
                "proposer": addr(1).to_string(),
                "voting_end_time": end.to_string(),
            }),
        ));
    }

    /// Store a configuration proposal object carrying a threshold change.
    pub fn put_config_proposal(&self, id: &ObjectId, seq: u64, sensor: u8, min: u64, max: u64, end: TimestampMs) {
        self.chain.put_object(ObjectFields::from_json(
            id.clone(),
            1,
            json!({
                "proposal_number": seq.to_string(),
                "proposal_type": ProposalType::Configuration.as_u8(),
                "title": "Threshold change",
                "proposer": addr(1).to_string(),
                "voting_end_time": end.to_string(),
                "config_sensor_type": sensor,
                "config_min": min.to_string(),
                "config_max": max.to_string(),
            }),
        ));
    }

    /// `ProposalCreated`.
    pub fn proposal_created(
        &self,
        tx: &str,
        id: &ObjectId,
        seq: u64,
        kind: ProposalType,
        title: &str,
        ts: TimestampMs,
    ) -> RawEvent {
        self.event(
            "ProposalCreated",
            tx,
            ts,
            json!({
                "proposal_id": id.to_string(),
                "proposal_number": seq.to_string(),
                "proposal_type": kind.as_u8(),
                "title": title,
                "proposer": addr(1).to_string(),
            }),
        )
    }

    /// `VoteCast`.
    pub fn vote_cast(&self, tx: &str, proposal: &ObjectId, voter: &ChainAddress, vote: bool, power: u64, ts: TimestampMs) -> RawEvent {
        self.event(
            "VoteCast",
            tx,
            ts,
            json!({
                "proposal_id": proposal.to_string(),
                "voter": voter.to_string(),
                "vote": vote,
                "voting_power": power.to_string(),
            }),
        )
    }

    /// `ProposalExecuted`.
    pub fn proposal_executed(&self, tx: &str, proposal: &ObjectId, approved: bool, yes: u64, no: u64, ts: TimestampMs) -> RawEvent {
        self.event(
            "ProposalExecuted",
            tx,
            ts,
            json!({
                "proposal_id": proposal.to_string(),
                "approved": approved,
                "yes_votes": yes.to_string(),
                "no_votes": no.to_string(),
            }),
        )
    }

    /// Store a data record object on chain.
    pub fn put_record(&self, id: &ObjectId, value: u64) {
        self.chain.put_object(ObjectFields::from_json(
            id.clone(),
            1,
            json!({
                "sensor_type": 0,
                "value": value.to_string(),
                "data_hash": [222, 173, 190, 239],
                "metadata": "bench 3",
            }),
        ));
    }

    /// `DataRecordCreated` for a temperature reading.
    pub fn data_record_created(
        &self,
        tx: &str,
        id: &ObjectId,
        seq: u64,
        value: u64,
        triggered: bool,
        ts: TimestampMs,
    ) -> RawEvent {
        self.event(
            "DataRecordCreated",
            tx,
            ts,
            json!({
                "record_id": id.to_string(),
                "data_id": seq.to_string(),
                "sensor_type": 0,
                "submitter": addr(1).to_string(),
                "value": value.to_string(),
                "triggered_alert": triggered,
            }),
        )
    }

    /// `AlertTriggered` for a temperature reading.
    pub fn alert_triggered(&self, tx: &str, record: &ObjectId, proposal: &ObjectId, value: u64, ts: TimestampMs) -> RawEvent {
        self.event(
            "AlertTriggered",
            tx,
            ts,
            json!({
                "record_id": record.to_string(),
                "sensor_type": 0,
                "value": value.to_string(),
                "threshold": "26",
                "proposal_id": proposal.to_string(),
            }),
        )
    }
}
