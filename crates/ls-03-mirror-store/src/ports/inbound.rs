//! # Inbound Ports
//!
//! The mirror API: typed reads plus a single atomic `commit`.

use async_trait::async_trait;
use shared_types::{ChainAddress, ObjectId, TimestampMs};

use crate::domain::{
    DashboardStats, Dao, DataRecord, DataRecordFilter, DeadLetter, DeferredEvent, MemberFilter,
    MemberLink, MirrorSnapshot, Page, PageRequest, PendingAlertLink, PendingMember,
    ProcessedEvent, Proposal, ProposalFilter, SensorType, StoreError, ThresholdConfig,
};

/// One write in a [`MirrorBatch`].
///
/// Versioned entities are written with the version the writer read; the
/// commit fails with `Conflict` if the stored version moved since.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorWrite {
    /// Upsert the DAO singleton.
    Dao(Dao),
    /// Upsert a member link. `user_id` must stay unique.
    Member(MemberLink),
    /// Stage a member whose address is not linked yet.
    PendingMember(PendingMember),
    /// Drop a staged member.
    ClearPendingMember(ChainAddress),
    /// Upsert a proposal.
    Proposal(Proposal),
    /// Upsert a data record.
    DataRecord(DataRecord),
    /// Stage an alert link for a record not yet mirrored.
    PendingAlert(PendingAlertLink),
    /// Drop a staged alert link.
    ClearPendingAlert(ObjectId),
    /// Upsert a sensor type.
    SensorType(SensorType),
    /// Upsert a threshold.
    Threshold(ThresholdConfig),
    /// Record an event as applied.
    Processed(ProcessedEvent),
    /// Upsert a dead letter.
    DeadLetter(DeadLetter),
    /// Park an event until its entity is available.
    Defer(DeferredEvent),
    /// Remove a parked event.
    ClearDeferred {
        /// Entity key
        entity: String,
        /// `txDigest#eventSeq`
        event_key: String,
    },
    /// Mark default sensors and thresholds as seeded.
    SetInitialized,
}

/// Writes committed together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorBatch {
    writes: Vec<MirrorWrite>,
}

impl MirrorBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write.
    pub fn push(&mut self, write: MirrorWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    /// Builder-style append.
    pub fn with(mut self, write: MirrorWrite) -> Self {
        self.writes.push(write);
        self
    }

    /// Whether the batch has no writes.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// The writes, in order.
    pub fn writes(&self) -> &[MirrorWrite] {
        &self.writes
    }

    /// Consume into the writes.
    pub fn into_writes(self) -> Vec<MirrorWrite> {
        self.writes
    }
}

/// Mirror store API - inbound port.
///
/// Readers may run concurrently with the applier; only the applier (and
/// the address-linking command) commits.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    // === DAO ===

    /// The DAO singleton, if bootstrapped.
    async fn get_dao(&self) -> Result<Option<Dao>, StoreError>;

    /// Whether default sensors and thresholds were seeded.
    async fn is_initialized(&self) -> Result<bool, StoreError>;

    // === Members ===

    /// Link by address.
    async fn get_member(&self, addr: &ChainAddress) -> Result<Option<MemberLink>, StoreError>;

    /// Link by application user id.
    async fn get_member_by_user(&self, user_id: &str) -> Result<Option<MemberLink>, StoreError>;

    /// Filtered, paginated links.
    async fn list_members(
        &self,
        filter: &MemberFilter,
        page: PageRequest,
    ) -> Result<Page<MemberLink>, StoreError>;

    /// Staged member for an unlinked address.
    async fn get_pending_member(
        &self,
        addr: &ChainAddress,
    ) -> Result<Option<PendingMember>, StoreError>;

    // === Proposals ===

    /// Proposal by object id.
    async fn get_proposal(&self, id: &ObjectId) -> Result<Option<Proposal>, StoreError>;

    /// Proposal by sequence id.
    async fn get_proposal_by_seq(&self, seq_id: u64) -> Result<Option<Proposal>, StoreError>;

    /// Filtered proposals, newest first.
    async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        now: TimestampMs,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError>;

    // === Data records ===

    /// Record by object id.
    async fn get_data_record(&self, id: &ObjectId) -> Result<Option<DataRecord>, StoreError>;

    /// Record linked to an alert proposal.
    async fn get_record_by_alert(&self, proposal: &ObjectId)
        -> Result<Option<DataRecord>, StoreError>;

    /// Filtered records, newest first.
    async fn list_data_records(
        &self,
        filter: &DataRecordFilter,
        page: PageRequest,
    ) -> Result<Page<DataRecord>, StoreError>;

    /// Staged alert link for a record.
    async fn get_pending_alert(
        &self,
        record_id: &ObjectId,
    ) -> Result<Option<PendingAlertLink>, StoreError>;

    // === Sensors ===

    /// All sensor types by id.
    async fn sensor_types(&self) -> Result<Vec<SensorType>, StoreError>;

    /// All thresholds by sensor id.
    async fn thresholds(&self) -> Result<Vec<ThresholdConfig>, StoreError>;

    /// Threshold for one sensor.
    async fn get_threshold(&self, sensor_type: u8) -> Result<Option<ThresholdConfig>, StoreError>;

    // === Pipeline bookkeeping ===

    /// Whether an event is in the processed log.
    async fn is_processed(&self, event_key: &str) -> Result<bool, StoreError>;

    /// Events ever recorded as processed.
    async fn processed_total(&self) -> Result<u64, StoreError>;

    /// Dead letter by event key.
    async fn get_dead_letter(&self, event_key: &str) -> Result<Option<DeadLetter>, StoreError>;

    /// Dead letters, most recent failure first.
    async fn list_dead_letters(&self, page: PageRequest) -> Result<Page<DeadLetter>, StoreError>;

    /// Events parked on an entity, in arrival order.
    async fn deferred_for(&self, entity: &str) -> Result<Vec<DeferredEvent>, StoreError>;

    // === Aggregates ===

    /// Dashboard counts and 30-day histograms.
    async fn dashboard_stats(&self, now: TimestampMs) -> Result<DashboardStats, StoreError>;

    /// Version-free copy of all mirrored entities.
    async fn snapshot(&self) -> Result<MirrorSnapshot, StoreError>;

    // === Writes ===

    /// Apply a batch atomically.
    async fn commit(&self, batch: MirrorBatch) -> Result<(), StoreError>;
}
