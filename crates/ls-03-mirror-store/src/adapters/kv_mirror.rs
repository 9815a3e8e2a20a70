//! # Key-Value Mirror Store
//!
//! [`MirrorStore`] over any [`KeyValueStore`]. Values are JSON documents;
//! key layout is described in `keys.rs`.
//!
//! `commit` runs under the store's write lock: version checks, unique-key
//! checks and index maintenance are staged against an overlay and then
//! written with one `atomic_batch_write`.
//!
//! A member link and a pending member entry never coexist for one address.
//! Whichever write would create the second one fails with `Conflict`, so
//! the losing writer re-reads and takes the other path.
//!
//! Listings start from the most selective secondary index the filter
//! names and only decode the documents it points at; the dashboard reads
//! counts and histograms from index keys alone.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{ChainAddress, ObjectId, TimestampMs};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::domain::{
    DailyCount, DashboardStats, Dao, DataRecord, DataRecordFilter, DeadLetter, DeferredEvent,
    MemberFilter, MemberLink, MirrorSnapshot, Page, PageRequest, PendingAlertLink, PendingMember,
    ProcessedEvent, Proposal, ProposalFilter, ProposalStatus, SensorType, StoreError,
    ThresholdConfig,
};
use crate::keys;
use crate::ports::{BatchOperation, KeyValueStore, MirrorBatch, MirrorStore, MirrorWrite};

/// Default size of the processed-event ring.
pub const DEFAULT_PROCESSED_CAPACITY: u64 = 100_000;

/// Days covered by dashboard histograms.
pub const HISTOGRAM_DAYS: u64 = 30;

/// Mirror store over a key-value backend.
pub struct KvMirrorStore<K: KeyValueStore> {
    kv: RwLock<K>,
    processed_capacity: u64,
}

#[derive(Deserialize)]
struct Versioned {
    #[serde(default)]
    version: u64,
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Codec {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

/// Pending writes plus a read-through overlay so later writes in a batch
/// see earlier ones.
struct Staging<'a, K: KeyValueStore> {
    kv: &'a K,
    overlay: HashMap<String, Option<Vec<u8>>>,
    ops: Vec<BatchOperation>,
}

impl<'a, K: KeyValueStore> Staging<'a, K> {
    fn new(kv: &'a K) -> Self {
        Self {
            kv,
            overlay: HashMap::new(),
            ops: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.overlay.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.kv.get(key.as_bytes())?)
    }

    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(bytes) => decode(key.as_bytes(), &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_doc(key)
    }

    fn put<T: Serialize>(&mut self, key: String, value: &T) -> Result<(), StoreError> {
        let bytes = encode(&key, value)?;
        self.overlay.insert(key.clone(), Some(bytes.clone()));
        self.ops.push(BatchOperation::put(key.into_bytes(), bytes));
        Ok(())
    }

    fn delete(&mut self, key: String) {
        self.overlay.insert(key.clone(), None);
        self.ops.push(BatchOperation::delete(key.into_bytes()));
    }

    /// Check the stored version and return the one to write.
    fn next_version(&self, entity: &'static str, key: &str, expected: u64) -> Result<u64, StoreError> {
        let current = match self.get(key)? {
            Some(bytes) => decode::<Versioned>(key.as_bytes(), &bytes)?.version,
            None => 0,
        };
        if current != expected {
            return Err(StoreError::Conflict {
                entity,
                key: key.to_string(),
                reason: format!("expected version {expected}, found {current}"),
            });
        }
        Ok(expected + 1)
    }

    /// Point a unique index at `owner`, failing if it names someone else.
    fn claim_index(
        &mut self,
        entity: &'static str,
        index_key: String,
        owner: &str,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.get_string(&index_key)? {
            if existing != owner {
                return Err(StoreError::Conflict {
                    entity,
                    key: index_key,
                    reason: format!("already held by {existing}"),
                });
            }
            return Ok(());
        }
        self.put(index_key, &owner)
    }

    /// Move `id` from the `old` secondary index entries to the `new` ones.
    fn reindex(&mut self, old: &[String], new: Vec<String>, id: &str) -> Result<(), StoreError> {
        for key in old.iter().filter(|k| !new.contains(k)) {
            self.delete(key.clone());
        }
        for key in new.into_iter().filter(|k| !old.contains(k)) {
            self.put(key, &id)?;
        }
        Ok(())
    }
}

fn day_of(ms: TimestampMs) -> Option<NaiveDate> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms).map(|d| d.date_naive())
}

/// Counts per UTC day for the `HISTOGRAM_DAYS` days ending at `now`.
fn histogram(now: TimestampMs, timestamps: impl Iterator<Item = TimestampMs>) -> Vec<DailyCount> {
    let Some(today) = day_of(now) else {
        return Vec::new();
    };
    let Some(start) = today.checked_sub_days(Days::new(HISTOGRAM_DAYS - 1)) else {
        return Vec::new();
    };

    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for day in timestamps.filter_map(day_of) {
        if day >= start && day <= today {
            *counts.entry(day).or_default() += 1;
        }
    }

    (0..HISTOGRAM_DAYS)
        .filter_map(|i| start.checked_add_days(Days::new(i)))
        .map(|day| DailyCount {
            date: day.format("%Y-%m-%d").to_string(),
            count: counts.get(&day).copied().unwrap_or(0),
        })
        .collect()
}

impl<K: KeyValueStore> KvMirrorStore<K> {
    /// Wrap a backend with the default processed-log capacity.
    pub fn new(kv: K) -> Self {
        Self::with_processed_capacity(kv, DEFAULT_PROCESSED_CAPACITY)
    }

    /// Wrap a backend with a bounded processed-event ring of `capacity`.
    pub fn with_processed_capacity(kv: K, capacity: u64) -> Self {
        Self {
            kv: RwLock::new(kv),
            processed_capacity: capacity.max(1),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.read().get(key.as_bytes())? {
            Some(bytes) => decode(key.as_bytes(), &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let pairs = self.kv.read().prefix_scan(prefix.as_bytes())?;
        pairs.iter().map(|(k, v)| decode(k, v)).collect()
    }

    /// `(value, id)` pairs of index entries under `prefix`, in key order.
    fn index_entries(&self, family: &str, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let pairs = self.kv.read().prefix_scan(prefix.as_bytes())?;
        Ok(pairs
            .iter()
            .filter_map(|(key, _)| {
                let key = std::str::from_utf8(key).ok()?;
                let (value, id) = keys::parse_index(family, key)?;
                Some((value.to_string(), id.to_string()))
            })
            .collect())
    }

    fn index_ids(&self, family: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .index_entries(family, prefix)?
            .into_iter()
            .map(|(_, id)| id)
            .collect())
    }

    /// Ids whose zero-padded timestamp in `family` lies in `[from, to]`.
    fn index_time_range(
        &self,
        family: &str,
        from: Option<TimestampMs>,
        to: Option<TimestampMs>,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .index_entries(family, &keys::index_family(family))?
            .into_iter()
            .filter(|(value, _)| {
                value.parse::<TimestampMs>().is_ok_and(|ts| {
                    from.map_or(true, |f| ts >= f) && to.map_or(true, |t| ts <= t)
                })
            })
            .map(|(_, id)| id)
            .collect())
    }

    /// Documents `<prefix><id>` for each id, skipping any that vanished.
    fn read_many<T: DeserializeOwned>(&self, prefix: &str, ids: Vec<String>) -> Result<Vec<T>, StoreError> {
        let kv = self.kv.read();
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            let key = format!("{prefix}{id}");
            if let Some(bytes) = kv.get(key.as_bytes())? {
                docs.push(decode(key.as_bytes(), &bytes)?);
            }
        }
        Ok(docs)
    }

    /// Proposal ids from the most selective index the filter names, or
    /// `None` when it names none.
    fn proposal_candidates(&self, filter: &ProposalFilter) -> Result<Option<Vec<String>>, StoreError> {
        let indexed = if let Some(voter) = &filter.voter {
            Some((keys::IDX_PROPOSAL_VOTER, keys::index_prefix(keys::IDX_PROPOSAL_VOTER, voter.as_str())))
        } else if let Some(proposer) = &filter.proposer {
            Some((
                keys::IDX_PROPOSAL_PROPOSER,
                keys::index_prefix(keys::IDX_PROPOSAL_PROPOSER, proposer.as_str()),
            ))
        } else if let Some(kind) = filter.proposal_type {
            Some((
                keys::IDX_PROPOSAL_TYPE,
                keys::index_prefix(keys::IDX_PROPOSAL_TYPE, &kind.as_u8().to_string()),
            ))
        } else {
            filter.status.map(|status| {
                let executed = matches!(
                    status,
                    ProposalStatus::ExecutedApproved | ProposalStatus::ExecutedRejected
                );
                (
                    keys::IDX_PROPOSAL_EXECUTED,
                    keys::index_flag(keys::IDX_PROPOSAL_EXECUTED, executed),
                )
            })
        };

        if let Some((family, prefix)) = indexed {
            return self.index_ids(family, &prefix).map(Some);
        }
        if filter.created_from.is_some() || filter.created_to.is_some() {
            return self
                .index_time_range(keys::IDX_PROPOSAL_CREATED, filter.created_from, filter.created_to)
                .map(Some);
        }
        Ok(None)
    }

    /// Record ids from the most selective index the filter names.
    fn record_candidates(&self, filter: &DataRecordFilter) -> Result<Option<Vec<String>>, StoreError> {
        if let Some(submitter) = &filter.submitter {
            let prefix = keys::index_prefix(keys::IDX_RECORD_SUBMITTER, submitter.as_str());
            return self.index_ids(keys::IDX_RECORD_SUBMITTER, &prefix).map(Some);
        }
        if let Some(sensor) = filter.sensor_type {
            return self
                .index_ids(keys::IDX_RECORD_SENSOR, &keys::index_sensor(sensor))
                .map(Some);
        }
        if let Some(flag) = filter.triggered_alert {
            let prefix = keys::index_flag(keys::IDX_RECORD_ALERT_FLAG, flag);
            return self.index_ids(keys::IDX_RECORD_ALERT_FLAG, &prefix).map(Some);
        }
        if filter.from.is_some() || filter.to.is_some() {
            return self
                .index_time_range(keys::IDX_RECORD_TIME, filter.from, filter.to)
                .map(Some);
        }
        Ok(None)
    }

    fn stage_write(&self, stage: &mut Staging<'_, K>, write: MirrorWrite) -> Result<(), StoreError> {
        match write {
            MirrorWrite::Dao(mut dao) => {
                dao.version = stage.next_version("dao", keys::DAO, dao.version)?;
                stage.put(keys::DAO.to_string(), &dao)?;
            }
            MirrorWrite::Member(mut link) => {
                let key = keys::member(&link.addr);
                if stage.get(&keys::pending_member(&link.addr))?.is_some() {
                    return Err(StoreError::Conflict {
                        entity: "member",
                        key,
                        reason: "address has an unabsorbed pending member entry".to_string(),
                    });
                }
                let previous = stage.get_doc::<MemberLink>(&key)?;
                link.version = stage.next_version("member", &key, link.version)?;
                stage.claim_index("member", keys::member_user(&link.user_id), link.addr.as_str())?;
                let old = previous.as_ref().map(keys::member_indices).unwrap_or_default();
                stage.reindex(&old, keys::member_indices(&link), link.addr.as_str())?;
                stage.put(key, &link)?;
            }
            MirrorWrite::PendingMember(pending) => {
                let linked = keys::member(&pending.addr);
                if stage.get(&linked)?.is_some() {
                    return Err(StoreError::Conflict {
                        entity: "pending_member",
                        key: linked,
                        reason: "address is already linked".to_string(),
                    });
                }
                stage.put(keys::pending_member(&pending.addr), &pending)?;
            }
            MirrorWrite::ClearPendingMember(addr) => stage.delete(keys::pending_member(&addr)),
            MirrorWrite::Proposal(mut proposal) => {
                let key = keys::proposal(&proposal.object_id);
                let previous = stage.get_doc::<Proposal>(&key)?;
                proposal.version = stage.next_version("proposal", &key, proposal.version)?;
                stage.claim_index(
                    "proposal",
                    keys::proposal_seq(proposal.seq_id),
                    proposal.object_id.as_str(),
                )?;
                let old = previous.as_ref().map(keys::proposal_indices).unwrap_or_default();
                stage.reindex(&old, keys::proposal_indices(&proposal), proposal.object_id.as_str())?;
                stage.put(key, &proposal)?;
            }
            MirrorWrite::DataRecord(mut record) => {
                let key = keys::record(&record.object_id);
                let previous = stage.get_doc::<DataRecord>(&key)?;
                record.version = stage.next_version("data_record", &key, record.version)?;
                stage.claim_index(
                    "data_record",
                    keys::record_seq(record.seq_id),
                    record.object_id.as_str(),
                )?;

                let old_alert = previous.as_ref().and_then(|p| p.alert_proposal.clone());
                if let Some(old_alert) = old_alert {
                    if record.alert_proposal.as_ref() != Some(&old_alert) {
                        stage.delete(keys::record_alert(&old_alert));
                    }
                }
                if let Some(alert) = &record.alert_proposal {
                    stage.claim_index(
                        "data_record",
                        keys::record_alert(alert),
                        record.object_id.as_str(),
                    )?;
                }

                let old = previous.as_ref().map(keys::record_indices).unwrap_or_default();
                stage.reindex(&old, keys::record_indices(&record), record.object_id.as_str())?;
                stage.put(key, &record)?;
            }
            MirrorWrite::PendingAlert(link) => {
                stage.put(keys::pending_alert(&link.record_id), &link)?;
            }
            MirrorWrite::ClearPendingAlert(record) => stage.delete(keys::pending_alert(&record)),
            MirrorWrite::SensorType(sensor) => {
                stage.put(keys::sensor(sensor.sensor_type_id), &sensor)?;
            }
            MirrorWrite::Threshold(mut threshold) => {
                if threshold.min_value >= threshold.max_value {
                    return Err(StoreError::Invariant(format!(
                        "threshold for sensor {} has min {} >= max {}",
                        threshold.sensor_type_id, threshold.min_value, threshold.max_value
                    )));
                }
                let key = keys::threshold(threshold.sensor_type_id);
                threshold.version = stage.next_version("threshold", &key, threshold.version)?;
                stage.put(key, &threshold)?;
            }
            MirrorWrite::Processed(entry) => self.stage_processed(stage, entry)?,
            MirrorWrite::DeadLetter(letter) => {
                stage.put(keys::dead_letter(&letter.event_key), &letter)?;
            }
            MirrorWrite::Defer(deferred) => {
                stage.put(keys::deferred(&deferred.entity, &deferred.event_key), &deferred)?;
            }
            MirrorWrite::ClearDeferred { entity, event_key } => {
                stage.delete(keys::deferred(&entity, &event_key));
            }
            MirrorWrite::SetInitialized => stage.put(keys::INITIALIZED.to_string(), &true)?,
        }
        Ok(())
    }

    /// Insert into the processed ring, evicting the entry in the reused slot.
    fn stage_processed(
        &self,
        stage: &mut Staging<'_, K>,
        entry: ProcessedEvent,
    ) -> Result<(), StoreError> {
        let key = keys::processed(&entry.event_key);
        if stage.get(&key)?.is_some() {
            return Ok(());
        }

        let total: u64 = match stage.get(keys::PROCESSED_TOTAL)? {
            Some(bytes) => decode(keys::PROCESSED_TOTAL.as_bytes(), &bytes)?,
            None => 0,
        };
        let slot_key = keys::processed_ring(total % self.processed_capacity);
        if let Some(evicted) = stage.get_string(&slot_key)? {
            stage.delete(keys::processed(&evicted));
        }

        stage.put(slot_key, &entry.event_key)?;
        stage.put(key, &entry)?;
        stage.put(keys::PROCESSED_TOTAL.to_string(), &(total + 1))
    }
}

#[async_trait]
impl<K: KeyValueStore + 'static> MirrorStore for KvMirrorStore<K> {
    async fn get_dao(&self) -> Result<Option<Dao>, StoreError> {
        self.read(keys::DAO)
    }

    async fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(self.read::<bool>(keys::INITIALIZED)?.unwrap_or(false))
    }

    async fn get_member(&self, addr: &ChainAddress) -> Result<Option<MemberLink>, StoreError> {
        self.read(&keys::member(addr))
    }

    async fn get_member_by_user(&self, user_id: &str) -> Result<Option<MemberLink>, StoreError> {
        match self.read::<ChainAddress>(&keys::member_user(user_id))? {
            Some(addr) => self.read(&keys::member(&addr)),
            None => Ok(None),
        }
    }

    async fn list_members(
        &self,
        filter: &MemberFilter,
        page: PageRequest,
    ) -> Result<Page<MemberLink>, StoreError> {
        let mut members: Vec<MemberLink> = match filter.is_member {
            Some(flag) => {
                let prefix = keys::index_flag(keys::IDX_MEMBER_IS, flag);
                let addrs = self.index_ids(keys::IDX_MEMBER_IS, &prefix)?;
                self.read_many(keys::MEMBER_PREFIX, addrs)?
            }
            None => self.scan(keys::MEMBER_PREFIX)?,
        };
        members.sort_by(|a, b| a.linked_at.cmp(&b.linked_at).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(page.paginate(members))
    }

    async fn get_pending_member(
        &self,
        addr: &ChainAddress,
    ) -> Result<Option<PendingMember>, StoreError> {
        self.read(&keys::pending_member(addr))
    }

    async fn get_proposal(&self, id: &ObjectId) -> Result<Option<Proposal>, StoreError> {
        self.read(&keys::proposal(id))
    }

    async fn get_proposal_by_seq(&self, seq_id: u64) -> Result<Option<Proposal>, StoreError> {
        match self.read::<ObjectId>(&keys::proposal_seq(seq_id))? {
            Some(id) => self.read(&keys::proposal(&id)),
            None => Ok(None),
        }
    }

    async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        now: TimestampMs,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError> {
        let candidates: Vec<Proposal> = match self.proposal_candidates(filter)? {
            Some(ids) => self.read_many(keys::PROPOSAL_PREFIX, ids)?,
            None => self.scan(keys::PROPOSAL_PREFIX)?,
        };
        let mut proposals: Vec<Proposal> = candidates
            .into_iter()
            .filter(|p| filter.matches(p, now))
            .collect();
        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq_id.cmp(&a.seq_id)));
        Ok(page.paginate(proposals))
    }

    async fn get_data_record(&self, id: &ObjectId) -> Result<Option<DataRecord>, StoreError> {
        self.read(&keys::record(id))
    }

    async fn get_record_by_alert(
        &self,
        proposal: &ObjectId,
    ) -> Result<Option<DataRecord>, StoreError> {
        match self.read::<ObjectId>(&keys::record_alert(proposal))? {
            Some(id) => self.read(&keys::record(&id)),
            None => Ok(None),
        }
    }

    async fn list_data_records(
        &self,
        filter: &DataRecordFilter,
        page: PageRequest,
    ) -> Result<Page<DataRecord>, StoreError> {
        let candidates: Vec<DataRecord> = match self.record_candidates(filter)? {
            Some(ids) => self.read_many(keys::RECORD_PREFIX, ids)?,
            None => self.scan(keys::RECORD_PREFIX)?,
        };
        let mut records: Vec<DataRecord> = candidates
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.seq_id.cmp(&a.seq_id)));
        Ok(page.paginate(records))
    }

    async fn get_pending_alert(
        &self,
        record_id: &ObjectId,
    ) -> Result<Option<PendingAlertLink>, StoreError> {
        self.read(&keys::pending_alert(record_id))
    }

    async fn sensor_types(&self) -> Result<Vec<SensorType>, StoreError> {
        self.scan(keys::SENSOR_PREFIX)
    }

    async fn thresholds(&self) -> Result<Vec<ThresholdConfig>, StoreError> {
        self.scan(keys::THRESHOLD_PREFIX)
    }

    async fn get_threshold(&self, sensor_type: u8) -> Result<Option<ThresholdConfig>, StoreError> {
        self.read(&keys::threshold(sensor_type))
    }

    async fn is_processed(&self, event_key: &str) -> Result<bool, StoreError> {
        Ok(self.kv.read().exists(keys::processed(event_key).as_bytes())?)
    }

    async fn processed_total(&self) -> Result<u64, StoreError> {
        Ok(self.read::<u64>(keys::PROCESSED_TOTAL)?.unwrap_or(0))
    }

    async fn get_dead_letter(&self, event_key: &str) -> Result<Option<DeadLetter>, StoreError> {
        self.read(&keys::dead_letter(event_key))
    }

    async fn list_dead_letters(&self, page: PageRequest) -> Result<Page<DeadLetter>, StoreError> {
        let mut letters: Vec<DeadLetter> = self.scan(keys::DEAD_LETTER_PREFIX)?;
        letters.sort_by(|a, b| b.last_failed_at.cmp(&a.last_failed_at));
        Ok(page.paginate(letters))
    }

    async fn deferred_for(&self, entity: &str) -> Result<Vec<DeferredEvent>, StoreError> {
        let mut parked: Vec<DeferredEvent> = self.scan(&keys::deferred_prefix(entity))?;
        parked.sort_by(|a, b| {
            a.deferred_at
                .cmp(&b.deferred_at)
                .then_with(|| a.event_key.cmp(&b.event_key))
        });
        Ok(parked)
    }

    async fn dashboard_stats(&self, now: TimestampMs) -> Result<DashboardStats, StoreError> {
        let dao: Option<Dao> = self.read(keys::DAO)?;
        let members = self.index_ids(
            keys::IDX_MEMBER_IS,
            &keys::index_flag(keys::IDX_MEMBER_IS, true),
        )?;

        let created = self.index_entries(
            keys::IDX_PROPOSAL_CREATED,
            &keys::index_family(keys::IDX_PROPOSAL_CREATED),
        )?;
        let open: HashSet<String> = self
            .index_ids(
                keys::IDX_PROPOSAL_EXECUTED,
                &keys::index_flag(keys::IDX_PROPOSAL_EXECUTED, false),
            )?
            .into_iter()
            .collect();
        let active = self
            .index_entries(keys::IDX_PROPOSAL_END, &keys::index_family(keys::IDX_PROPOSAL_END))?
            .into_iter()
            .filter(|(end, id)| open.contains(id) && end.parse::<TimestampMs>().is_ok_and(|end| now < end))
            .count() as u64;
        let executed: Vec<Proposal> = self.read_many(
            keys::PROPOSAL_PREFIX,
            self.index_ids(
                keys::IDX_PROPOSAL_EXECUTED,
                &keys::index_flag(keys::IDX_PROPOSAL_EXECUTED, true),
            )?,
        )?;

        let records = self.index_entries(
            keys::IDX_RECORD_TIME,
            &keys::index_family(keys::IDX_RECORD_TIME),
        )?;
        let alerting: HashSet<String> = self
            .index_ids(
                keys::IDX_RECORD_ALERT_FLAG,
                &keys::index_flag(keys::IDX_RECORD_ALERT_FLAG, true),
            )?
            .into_iter()
            .collect();

        let parse = |ts: &String| ts.parse::<TimestampMs>().ok();
        let proposal_times: Vec<TimestampMs> = created.iter().filter_map(|(ts, _)| parse(ts)).collect();
        let record_times: Vec<TimestampMs> = records.iter().filter_map(|(ts, _)| parse(ts)).collect();
        let alert_times: Vec<TimestampMs> = records
            .iter()
            .filter(|(_, id)| alerting.contains(id))
            .filter_map(|(ts, _)| parse(ts))
            .collect();

        Ok(DashboardStats {
            total_members: members.len() as u64,
            total_proposals: created.len() as u64,
            active_proposals: active,
            executed_proposals: executed.len() as u64,
            approved_proposals: executed.iter().filter(|p| p.approved == Some(true)).count() as u64,
            total_data_records: records.len() as u64,
            alert_records: alerting.len() as u64,
            treasury_balance: dao.map_or(0, |d| d.treasury_balance),
            proposals_by_day: histogram(now, proposal_times.into_iter()),
            records_by_day: histogram(now, record_times.into_iter()),
            alerts_by_day: histogram(now, alert_times.into_iter()),
        })
    }

    async fn snapshot(&self) -> Result<MirrorSnapshot, StoreError> {
        let dao = self.read::<Dao>(keys::DAO)?.map(|d| Dao { version: 0, ..d });
        let members = self
            .scan::<MemberLink>(keys::MEMBER_PREFIX)?
            .into_iter()
            .map(|m| MemberLink { version: 0, ..m })
            .collect();
        let proposals = self
            .scan::<Proposal>(keys::PROPOSAL_PREFIX)?
            .into_iter()
            .map(|p| Proposal { version: 0, ..p })
            .collect();
        let records = self
            .scan::<DataRecord>(keys::RECORD_PREFIX)?
            .into_iter()
            .map(|r| DataRecord { version: 0, ..r })
            .collect();
        let thresholds = self
            .scan::<ThresholdConfig>(keys::THRESHOLD_PREFIX)?
            .into_iter()
            .map(|t| ThresholdConfig { version: 0, ..t })
            .collect();

        Ok(MirrorSnapshot {
            dao,
            members,
            pending_members: self.scan(keys::PENDING_MEMBER_PREFIX)?,
            proposals,
            records,
            pending_alerts: self.scan(keys::PENDING_ALERT_PREFIX)?,
            sensor_types: self.scan(keys::SENSOR_PREFIX)?,
            thresholds,
        })
    }

    async fn commit(&self, batch: MirrorBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut kv = self.kv.write();
        let ops = {
            let mut stage = Staging::new(&*kv);
            for write in batch.into_writes() {
                if let Err(e) = self.stage_write(&mut stage, write) {
                    warn!(error = %e, kind = %e.kind(), "[ls-03] commit rejected");
                    return Err(e);
                }
            }
            stage.ops
        };
        let count = ops.len();
        kv.atomic_batch_write(ops)?;
        debug!(ops = count, "[ls-03] batch committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKVStore;
    use crate::domain::{MemberDetails, Voter};
    use shared_types::{EventCursor, EventId, ProposalType};

    // =========================================================================
    // TEST HELPERS
    // =========================================================================

    fn store() -> KvMirrorStore<InMemoryKVStore> {
        KvMirrorStore::new(InMemoryKVStore::new())
    }

    fn addr(s: &str) -> ChainAddress {
        ChainAddress::parse(s).unwrap()
    }

    fn proposal(id: &str, seq: u64, created_at: u64, end: u64) -> Proposal {
        Proposal {
            object_id: addr(id),
            seq_id: seq,
            proposal_type: ProposalType::General,
            title: format!("P{seq}"),
            description: String::new(),
            proposer: addr("0x1"),
            created_at,
            voting_end_time: end,
            executed: false,
            approved: None,
            executed_at: None,
            yes_votes: 0,
            no_votes: 0,
            voters: Vec::new(),
            data_ref: None,
            alert_value: None,
            alert_sensor: None,
            config_change: None,
            version: 0,
        }
    }

    fn record(id: &str, seq: u64, ts: u64, alert: bool) -> DataRecord {
        DataRecord {
            object_id: addr(id),
            seq_id: seq,
            sensor_type: 0,
            submitter: addr("0x1"),
            data_hash: "ab".into(),
            metadata: String::new(),
            timestamp: ts,
            value: 20,
            triggered_alert: alert,
            alert_proposal: None,
            version: 0,
        }
    }

    /// `value/id` pairs of one index family.
    fn index_of(s: &KvMirrorStore<InMemoryKVStore>, family: &str) -> Vec<String> {
        s.index_entries(family, &keys::index_family(family))
            .unwrap()
            .into_iter()
            .map(|(value, id)| format!("{value}/{id}"))
            .collect()
    }

    fn pending(a: &str) -> MirrorWrite {
        MirrorWrite::PendingMember(PendingMember {
            addr: addr(a),
            details: MemberDetails {
                name: "Bob".into(),
                joined_at: 1,
                voting_power: 3,
            },
        })
    }

    fn processed(key: &str) -> MirrorWrite {
        MirrorWrite::Processed(ProcessedEvent {
            event_key: key.into(),
            kind: "vote_cast".into(),
            processed_at: 1,
        })
    }

    // =========================================================================
    // OPTIMISTIC CONCURRENCY
    // =========================================================================

    #[tokio::test]
    async fn test_versions_increment_and_stale_writes_conflict() {
        let s = store();
        s.commit(MirrorBatch::new().with(MirrorWrite::Proposal(proposal("0xa", 1, 0, 10))))
            .await
            .unwrap();

        let stored = s.get_proposal(&addr("0xa")).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        let mut first = stored.clone();
        first.yes_votes = 5;
        s.commit(MirrorBatch::new().with(MirrorWrite::Proposal(first))).await.unwrap();

        let mut stale = stored;
        stale.no_votes = 5;
        let err = s
            .commit(MirrorBatch::new().with(MirrorWrite::Proposal(stale)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::Conflict);
        assert_eq!(s.get_proposal(&addr("0xa")).await.unwrap().unwrap().yes_votes, 5);
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let s = store();
        s.commit(MirrorBatch::new().with(MirrorWrite::Proposal(proposal("0xa", 1, 0, 10))))
            .await
            .unwrap();

        // Second write reuses version 0 for an existing proposal.
        let batch = MirrorBatch::new()
            .with(MirrorWrite::DataRecord(record("0xb", 1, 0, false)))
            .with(MirrorWrite::Proposal(proposal("0xa", 1, 0, 10)));
        assert!(s.commit(batch).await.is_err());
        assert!(s.get_data_record(&addr("0xb")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_id_is_unique() {
        let s = store();
        s.commit(MirrorBatch::new().with(MirrorWrite::Member(MemberLink::new("U1", addr("0x1"), 0))))
            .await
            .unwrap();

        let other_addr = MemberLink::new("U1", addr("0x2"), 0);
        let err = s
            .commit(MirrorBatch::new().with(MirrorWrite::Member(other_addr)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "member", .. }));

        let same_addr = MemberLink::new("U2", addr("0x1"), 0);
        assert!(s
            .commit(MirrorBatch::new().with(MirrorWrite::Member(same_addr)))
            .await
            .is_err());

        let found = s.get_member_by_user("U1").await.unwrap().unwrap();
        assert_eq!(found.addr, addr("0x1"));
    }

    #[tokio::test]
    async fn test_inverted_threshold_rejected() {
        let s = store();
        let err = s
            .commit(MirrorBatch::new().with(MirrorWrite::Threshold(ThresholdConfig {
                sensor_type_id: 0,
                min_value: 30,
                max_value: 20,
                description: String::new(),
                active: true,
                updated_at: 0,
                version: 0,
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
    }

    #[tokio::test]
    async fn test_pending_member_and_link_exclude_each_other() {
        let s = store();
        s.commit(MirrorBatch::new().with(MirrorWrite::Member(MemberLink::new("U1", addr("0x1"), 0))))
            .await
            .unwrap();
        let err = s.commit(MirrorBatch::new().with(pending("0x1"))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "pending_member", .. }));
        assert!(s.get_pending_member(&addr("0x1")).await.unwrap().is_none());

        s.commit(MirrorBatch::new().with(pending("0x2"))).await.unwrap();
        let err = s
            .commit(MirrorBatch::new().with(MirrorWrite::Member(MemberLink::new("U2", addr("0x2"), 0))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "member", .. }));

        // Absorbing the entry in the same batch is the accepted path.
        s.commit(
            MirrorBatch::new()
                .with(MirrorWrite::ClearPendingMember(addr("0x2")))
                .with(MirrorWrite::Member(MemberLink::new("U2", addr("0x2"), 0))),
        )
        .await
        .unwrap();
        assert!(s.get_member(&addr("0x2")).await.unwrap().is_some());
        assert!(s.get_pending_member(&addr("0x2")).await.unwrap().is_none());
    }

    // =========================================================================
    // SECONDARY INDICES
    // =========================================================================

    #[tokio::test]
    async fn test_proposal_indices_follow_updates() {
        let s = store();
        let id = addr("0xa");
        s.commit(MirrorBatch::new().with(MirrorWrite::Proposal(proposal("0xa", 1, 100, 6000))))
            .await
            .unwrap();
        assert_eq!(index_of(&s, keys::IDX_PROPOSAL_EXECUTED), vec![format!("0/{id}")]);
        assert!(index_of(&s, keys::IDX_PROPOSAL_VOTER).is_empty());

        let mut stored = s.get_proposal(&id).await.unwrap().unwrap();
        stored.voters.push(Voter {
            addr: addr("0x9"),
            vote: false,
            power: 4,
            voted_at: 150,
        });
        stored.no_votes = 4;
        stored.executed = true;
        stored.approved = Some(false);
        stored.executed_at = Some(4000);
        s.commit(MirrorBatch::new().with(MirrorWrite::Proposal(stored))).await.unwrap();

        assert_eq!(index_of(&s, keys::IDX_PROPOSAL_EXECUTED), vec![format!("1/{id}")]);
        assert_eq!(index_of(&s, keys::IDX_PROPOSAL_VOTER), vec![format!("{}/{id}", addr("0x9"))]);
        assert_eq!(
            index_of(&s, keys::IDX_PROPOSAL_CREATED),
            vec![format!("{:020}/{id}", 100)]
        );
        assert_eq!(
            index_of(&s, keys::IDX_PROPOSAL_PROPOSER),
            vec![format!("{}/{id}", addr("0x1"))]
        );

        let status = |status| ProposalFilter {
            status: Some(status),
            ..Default::default()
        };
        for (wanted, total) in [
            (ProposalStatus::Active, 0),
            (ProposalStatus::ExecutedApproved, 0),
            (ProposalStatus::ExecutedRejected, 1),
        ] {
            let page = s
                .list_proposals(&status(wanted), 5000, PageRequest::default())
                .await
                .unwrap();
            assert_eq!(page.total, total, "{wanted:?}");
        }

        let window = ProposalFilter {
            created_from: Some(50),
            created_to: Some(99),
            ..Default::default()
        };
        assert_eq!(s.list_proposals(&window, 5000, PageRequest::default()).await.unwrap().total, 0);

        let stats = s.dashboard_stats(5000).await.unwrap();
        assert_eq!(stats.total_proposals, 1);
        assert_eq!(stats.active_proposals, 0);
        assert_eq!(stats.executed_proposals, 1);
        assert_eq!(stats.approved_proposals, 0);
    }

    #[tokio::test]
    async fn test_record_indices_follow_updates() {
        let s = store();
        let id = addr("0xc");
        s.commit(MirrorBatch::new().with(MirrorWrite::DataRecord(record("0xc", 1, 10, false))))
            .await
            .unwrap();
        assert_eq!(index_of(&s, keys::IDX_RECORD_ALERT_FLAG), vec![format!("0/{id}")]);

        let mut stored = s.get_data_record(&id).await.unwrap().unwrap();
        stored.triggered_alert = true;
        stored.alert_proposal = Some(addr("0xe"));
        s.commit(MirrorBatch::new().with(MirrorWrite::DataRecord(stored))).await.unwrap();
        assert_eq!(index_of(&s, keys::IDX_RECORD_ALERT_FLAG), vec![format!("1/{id}")]);

        // Relinking drops the old alert lookup.
        let mut stored = s.get_data_record(&id).await.unwrap().unwrap();
        stored.alert_proposal = Some(addr("0xf"));
        s.commit(MirrorBatch::new().with(MirrorWrite::DataRecord(stored))).await.unwrap();
        assert!(s.get_record_by_alert(&addr("0xe")).await.unwrap().is_none());
        assert_eq!(
            s.get_record_by_alert(&addr("0xf")).await.unwrap().unwrap().object_id,
            id
        );

        let by_sensor = DataRecordFilter {
            sensor_type: Some(0),
            ..Default::default()
        };
        assert_eq!(s.list_data_records(&by_sensor, PageRequest::default()).await.unwrap().total, 1);
        let other_submitter = DataRecordFilter {
            submitter: Some(addr("0x2")),
            ..Default::default()
        };
        assert_eq!(
            s.list_data_records(&other_submitter, PageRequest::default())
                .await
                .unwrap()
                .total,
            0
        );
        let window = DataRecordFilter {
            from: Some(5),
            to: Some(10),
            ..Default::default()
        };
        assert_eq!(s.list_data_records(&window, PageRequest::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_member_flag_index_follows_updates() {
        let s = store();
        s.commit(
            MirrorBatch::new()
                .with(MirrorWrite::Member(MemberLink::new("U1", addr("0x1"), 1)))
                .with(MirrorWrite::Member(MemberLink::new("U2", addr("0x2"), 2))),
        )
        .await
        .unwrap();

        let mut link = s.get_member(&addr("0x2")).await.unwrap().unwrap();
        link.is_member = true;
        s.commit(MirrorBatch::new().with(MirrorWrite::Member(link))).await.unwrap();

        assert_eq!(index_of(&s, keys::IDX_MEMBER_IS), vec![
            format!("0/{}", addr("0x1")),
            format!("1/{}", addr("0x2")),
        ]);
        let members = s
            .list_members(
                &MemberFilter {
                    is_member: Some(true),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(members.total, 1);
        assert_eq!(members.items[0].user_id, "U2");
        assert_eq!(s.dashboard_stats(10).await.unwrap().total_members, 1);
    }

    // =========================================================================
    // PROCESSED RING
    // =========================================================================

    #[tokio::test]
    async fn test_processed_ring_evicts_oldest() {
        let s = KvMirrorStore::with_processed_capacity(InMemoryKVStore::new(), 2);
        for key in ["a#0", "b#0", "c#0"] {
            s.commit(MirrorBatch::new().with(processed(key))).await.unwrap();
        }
        assert!(!s.is_processed("a#0").await.unwrap());
        assert!(s.is_processed("b#0").await.unwrap());
        assert!(s.is_processed("c#0").await.unwrap());
        assert_eq!(s.processed_total().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_processed_is_idempotent_within_batch() {
        let s = store();
        s.commit(MirrorBatch::new().with(processed("a#0")).with(processed("a#0")))
            .await
            .unwrap();
        assert_eq!(s.processed_total().await.unwrap(), 1);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[tokio::test]
    async fn test_list_proposals_filters_by_status_and_voter() {
        let s = store();
        let mut voted = proposal("0xa", 1, 100, 6000);
        voted.voters.push(Voter {
            addr: addr("0x9"),
            vote: true,
            power: 1,
            voted_at: 150,
        });
        voted.yes_votes = 1;
        let expired = proposal("0xb", 2, 200, 4000);
        s.commit(
            MirrorBatch::new()
                .with(MirrorWrite::Proposal(voted))
                .with(MirrorWrite::Proposal(expired)),
        )
        .await
        .unwrap();

        let all = s
            .list_proposals(&ProposalFilter::default(), 5000, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.items[0].seq_id, 2); // newest first

        let active = s
            .list_proposals(
                &ProposalFilter {
                    status: Some(ProposalStatus::Active),
                    ..Default::default()
                },
                5000,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(active.total, 1);
        assert_eq!(active.items[0].seq_id, 1);

        let by_voter = s
            .list_proposals(
                &ProposalFilter {
                    voter: Some(addr("0x9")),
                    ..Default::default()
                },
                5000,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_voter.total, 1);
        assert_eq!(s.get_proposal_by_seq(2).await.unwrap().unwrap().object_id, addr("0xb"));
    }

    #[tokio::test]
    async fn test_record_alert_index() {
        let s = store();
        let mut r = record("0xc", 1, 10, true);
        r.alert_proposal = Some(addr("0xe"));
        s.commit(MirrorBatch::new().with(MirrorWrite::DataRecord(r))).await.unwrap();

        let linked = s.get_record_by_alert(&addr("0xe")).await.unwrap().unwrap();
        assert_eq!(linked.object_id, addr("0xc"));

        let alerts = s
            .list_data_records(
                &DataRecordFilter {
                    triggered_alert: Some(true),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(alerts.total, 1);
    }

    #[tokio::test]
    async fn test_dashboard_histograms_cover_thirty_days() {
        let s = store();
        let day = 86_400_000u64;
        let now = 100 * day + 1000;
        s.commit(
            MirrorBatch::new()
                .with(MirrorWrite::DataRecord(record("0x1", 1, now - 1000, true)))
                .with(MirrorWrite::DataRecord(record("0x2", 2, now - 2 * day, false)))
                .with(MirrorWrite::DataRecord(record("0x3", 3, now - 40 * day, false))),
        )
        .await
        .unwrap();

        let stats = s.dashboard_stats(now).await.unwrap();
        assert_eq!(stats.total_data_records, 3);
        assert_eq!(stats.alert_records, 1);
        assert_eq!(stats.records_by_day.len(), 30);
        assert_eq!(stats.records_by_day.iter().map(|d| d.count).sum::<u64>(), 2);
        assert_eq!(stats.records_by_day.last().unwrap().count, 1);
        assert_eq!(stats.alerts_by_day.last().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_strips_versions_and_deferred_order() {
        let s = store();
        let mut dao = Dao::new(addr("0xd0"), "LabShare", addr("0xad"));
        dao.advance_cursor(&EventCursor::new(EventId::new("t", 0), 5));
        s.commit(MirrorBatch::new().with(MirrorWrite::Dao(dao))).await.unwrap();
        let mut link = MemberLink::new("U1", addr("0x1"), 0);
        link.is_member = true;
        link.member_details = Some(MemberDetails {
            name: "Alice".into(),
            joined_at: 1,
            voting_power: 10,
        });
        s.commit(MirrorBatch::new().with(MirrorWrite::Member(link))).await.unwrap();

        let snap = s.snapshot().await.unwrap();
        assert_eq!(snap.dao.unwrap().version, 0);
        assert_eq!(snap.members[0].version, 0);

        for (key, at) in [("z#0", 1u64), ("a#0", 2u64)] {
            s.commit(MirrorBatch::new().with(MirrorWrite::Defer(DeferredEvent {
                entity: "proposal:0xa".into(),
                event_key: key.into(),
                raw_envelope: serde_json::json!({}),
                reason: "not found".into(),
                deferred_at: at,
            })))
            .await
            .unwrap();
        }
        let parked = s.deferred_for("proposal:0xa").await.unwrap();
        assert_eq!(parked[0].event_key, "z#0");
    }
}
