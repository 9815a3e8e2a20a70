//! # Mirror Applier Service
//!
//! Turns raw chain events into mirror commits.
//!
//! ## Per-event flow
//!
//! ```text
//! raw ──► processed? ──yes──► Duplicate
//!           │ no
//!           ▼
//!       normalize ──err──► failure (Validation: dead letter now)
//!           │
//!           ▼
//!   lock entity ─► replay parked events ─► handler ─► commit
//!                                            │          │ Conflict: re-run handler
//!                                            │ NotFound ▼
//!                                            └──► park on entity
//! ```
//!
//! Every commit carries the event's `Processed` entry and, when it moves
//! forward, the DAO cursor, so the mirror, the processed log and the
//! cursor never disagree.

use async_trait::async_trait;
use dashmap::DashMap;
use labshare_telemetry::{
    log_event, time_histogram, APPLY_DURATION, APPLY_FAILURES, DEAD_LETTERED, EVENTS_APPLIED,
};
use ls_01_chain_client::{ChainClient, ObjectFields, RawEvent};
use ls_03_mirror_store::{
    Dao, DeadLetter, DeferredEvent, MirrorBatch, MirrorStore, MirrorWrite, ProcessedEvent,
    StoreError,
};
use ls_04_event_normalizer::{
    normalize, parse_timestamp, EntityKey, NormalizedEnvelope, NormalizedEvent,
};
use serde_json::Value;
use shared_types::{Clock, EventCursor, ObjectId, TimestampMs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::locks::EntityLocks;
use crate::config::ApplierConfig;
use crate::domain::{ApplyError, ApplyOutcome, ProcessedEventSet};
use crate::ports::EventApplier;

/// Failure bookkeeping for one event key.
#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    attempts: u32,
    first_failed_at: TimestampMs,
}

/// Writes staged by one handler run, plus the DAO it read.
pub(crate) struct Unit {
    pub(crate) batch: MirrorBatch,
    pub(crate) dao: Option<Dao>,
    pub(crate) dao_dirty: bool,
    pub(crate) changed: bool,
}

impl Unit {
    fn new(dao: Option<Dao>) -> Self {
        Self {
            batch: MirrorBatch::new(),
            dao,
            dao_dirty: false,
            changed: false,
        }
    }

    /// Stage an entity write.
    pub(crate) fn push(&mut self, write: MirrorWrite) {
        self.changed = true;
        self.batch.push(write);
    }

    /// The DAO for mutation; fails if the mirror was never bootstrapped.
    pub(crate) fn dao_mut(&mut self) -> Result<&mut Dao, ApplyError> {
        let dao = self.dao.as_mut().ok_or(ApplyError::NotBootstrapped)?;
        self.dao_dirty = true;
        self.changed = true;
        Ok(dao)
    }
}

/// Mirror applier.
pub struct MirrorApplier {
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) store: Arc<dyn MirrorStore>,
    clock: Arc<dyn Clock>,
    config: ApplierConfig,
    processed: ProcessedEventSet,
    locks: EntityLocks,
    failures: DashMap<String, FailureRecord>,
    applied: AtomicU64,
}

fn envelope_json(raw: &RawEvent) -> Value {
    serde_json::to_value(raw).unwrap_or(Value::Null)
}

/// Stream position of a raw envelope, when it carries a usable timestamp.
fn raw_cursor(raw: &RawEvent) -> Option<EventCursor> {
    let ts = parse_timestamp(raw.timestamp_ms.as_deref()?).ok()?;
    Some(EventCursor::new(raw.id.clone(), ts))
}

impl MirrorApplier {
    /// Create an applier over a chain client and a mirror store.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn MirrorStore>,
        clock: Arc<dyn Clock>,
        config: ApplierConfig,
    ) -> Self {
        Self {
            processed: ProcessedEventSet::new(config.event_cache_size),
            chain,
            store,
            clock,
            config,
            locks: EntityLocks::new(),
            failures: DashMap::new(),
            applied: AtomicU64::new(0),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ApplierConfig {
        &self.config
    }

    /// Failed attempts recorded for an event that is not yet settled.
    pub fn attempts(&self, event_key: &str) -> u32 {
        self.failures.get(event_key).map_or(0, |f| f.attempts)
    }

    pub(crate) async fn fetch(
        &self,
        id: &ObjectId,
        entity: EntityKey,
    ) -> Result<ObjectFields, ApplyError> {
        self.chain
            .get_object(id)
            .await?
            .ok_or_else(|| ApplyError::NotFound {
                entity: entity.to_string(),
            })
    }

    async fn check_processed(&self, key: &str) -> Result<bool, ApplyError> {
        if self.processed.contains(key) {
            return Ok(true);
        }
        let stored = self.store.is_processed(key).await?;
        if stored {
            self.processed.insert(key);
        }
        Ok(stored)
    }

    /// Commit `writes` together with a cursor advance, re-reading the DAO
    /// when a concurrent writer moved it.
    async fn commit_settled(
        &self,
        cursor: Option<&EventCursor>,
        writes: Vec<MirrorWrite>,
    ) -> Result<(), ApplyError> {
        let mut attempt = 0;
        loop {
            let mut batch = MirrorBatch::new();
            for write in &writes {
                batch.push(write.clone());
            }
            if let (Some(cursor), Some(mut dao)) = (cursor, self.store.get_dao().await?) {
                if dao.advance_cursor(cursor) {
                    batch.push(MirrorWrite::Dao(dao));
                }
            }
            match self.store.commit(batch).await {
                Err(StoreError::Conflict { .. }) if attempt < self.config.conflict_retries => {
                    attempt += 1;
                }
                other => return other.map_err(ApplyError::from),
            }
        }
    }

    /// Run the handler for `envelope` and commit its writes.
    ///
    /// `parked` names the entity the envelope is parked on, if any; success
    /// clears it from there, and a renewed `NotFound` leaves it in place.
    async fn apply_locked(&self, envelope: &NormalizedEnvelope, parked: Option<&str>) -> ApplyOutcome {
        let key = envelope.id.key();
        let label = envelope.event.label();
        let cursor = envelope.cursor();
        let mut attempt = 0;

        loop {
            let unit = match self.run_handler(envelope).await {
                Ok(unit) => unit,
                Err(ApplyError::NotFound { entity }) => {
                    if parked.is_some() {
                        return ApplyOutcome::Deferred { entity };
                    }
                    return self.defer(envelope, entity).await;
                }
                Err(e) => return self.record_failure(&envelope.raw, e).await,
            };

            let Unit {
                mut batch,
                mut dao,
                dao_dirty,
                changed,
            } = unit;

            let mut write_dao = dao_dirty;
            if let Some(d) = dao.as_mut() {
                write_dao |= d.advance_cursor(&cursor);
            }
            if write_dao {
                if let Some(d) = dao {
                    batch.push(MirrorWrite::Dao(d));
                }
            }
            if let Some(entity) = parked {
                batch.push(MirrorWrite::ClearDeferred {
                    entity: entity.to_string(),
                    event_key: key.clone(),
                });
            }
            batch.push(MirrorWrite::Processed(ProcessedEvent {
                event_key: key.clone(),
                kind: label.to_string(),
                processed_at: self.clock.now_ms(),
            }));

            match self.store.commit(batch).await {
                Ok(()) => {
                    self.processed.insert(key.clone());
                    self.failures.remove(&key);
                    self.applied.fetch_add(1, Ordering::Relaxed);
                    EVENTS_APPLIED.with_label_values(&[label]).inc();
                    debug!(event_id = %key, kind = label, changed, "[ls-06] event applied");

                    return match &envelope.event {
                        NormalizedEvent::Unknown { name } => ApplyOutcome::Ignored { name: name.clone() },
                        _ => ApplyOutcome::Applied { kind: label, changed },
                    };
                }
                Err(StoreError::Conflict { entity, key: store_key, .. })
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    debug!(
                        event_id = %key,
                        entity,
                        store_key = %store_key,
                        attempt,
                        "[ls-06] version conflict, re-running handler"
                    );
                }
                Err(e) => return self.record_failure(&envelope.raw, e.into()).await,
            }
        }
    }

    /// Park an envelope whose chain dependency does not exist yet.
    async fn defer(&self, envelope: &NormalizedEnvelope, entity: String) -> ApplyOutcome {
        let key = envelope.id.key();
        let parked = DeferredEvent {
            entity: entity.clone(),
            event_key: key.clone(),
            raw_envelope: envelope_json(&envelope.raw),
            reason: format!("chain object for {entity} not found"),
            deferred_at: self.clock.now_ms(),
        };

        match self
            .commit_settled(Some(&envelope.cursor()), vec![MirrorWrite::Defer(parked)])
            .await
        {
            Ok(()) => {
                log_event!(info, "ls-06", "[ls-06] event deferred until its entity exists",
                    event_id = %key, entity = %entity);
                ApplyOutcome::Deferred { entity }
            }
            Err(e) => self.record_failure(&envelope.raw, e).await,
        }
    }

    /// Count a failure; dead-letter it when permanent or out of retries.
    async fn record_failure(&self, raw: &RawEvent, error: ApplyError) -> ApplyOutcome {
        let key = raw.id.key();
        let now = self.clock.now_ms();
        APPLY_FAILURES.with_label_values(&[error.kind().as_str()]).inc();

        let record = {
            let mut entry = self.failures.entry(key.clone()).or_insert(FailureRecord {
                attempts: 0,
                first_failed_at: now,
            });
            entry.attempts += 1;
            *entry
        };

        if !error.is_permanent() && record.attempts < self.config.max_event_retries {
            log_event!(warn, "ls-06", "[ls-06] apply failed, will retry",
                event_id = %key, error_kind = %error.kind(), attempt = record.attempts, error = %error);
            return ApplyOutcome::Failed {
                error,
                attempts: record.attempts,
            };
        }

        let letter = DeadLetter {
            event_key: key.clone(),
            event_type: raw.type_.clone(),
            raw_envelope: envelope_json(raw),
            error: error.to_string(),
            error_kind: error.kind(),
            attempts: record.attempts,
            first_failed_at: record.first_failed_at,
            last_failed_at: now,
        };
        let processed = ProcessedEvent {
            event_key: key.clone(),
            kind: "dead_letter".to_string(),
            processed_at: now,
        };

        match self
            .commit_settled(
                raw_cursor(raw).as_ref(),
                vec![MirrorWrite::DeadLetter(letter), MirrorWrite::Processed(processed)],
            )
            .await
        {
            Ok(()) => {
                self.failures.remove(&key);
                self.processed.insert(key.clone());
                DEAD_LETTERED.inc();
                log_event!(error, "ls-06", "[ls-06] event moved to dead letters",
                    event_id = %key, error_kind = %error.kind(), attempts = record.attempts, error = %error);
                ApplyOutcome::DeadLettered { error }
            }
            Err(commit_err) => {
                warn!(event_id = %key, error = %commit_err, "[ls-06] could not write dead letter");
                ApplyOutcome::Failed {
                    error,
                    attempts: record.attempts,
                }
            }
        }
    }

    /// Re-run envelopes parked on `entity`, oldest first. Returns whether
    /// `current` is among them.
    async fn replay_parked(&self, entity: &str, current: &str) -> bool {
        let parked = match self.store.deferred_for(entity).await {
            Ok(parked) => parked,
            Err(e) => {
                warn!(entity, error = %e, "[ls-06] could not read parked events");
                return false;
            }
        };

        let mut current_parked = false;
        for item in parked {
            if item.event_key == current {
                current_parked = true;
                continue;
            }

            if matches!(self.check_processed(&item.event_key).await, Ok(true)) {
                let clear = MirrorWrite::ClearDeferred {
                    entity: entity.to_string(),
                    event_key: item.event_key.clone(),
                };
                if let Err(e) = self.store.commit(MirrorBatch::new().with(clear)).await {
                    warn!(entity, error = %e, "[ls-06] could not clear parked event");
                }
                continue;
            }

            let envelope = match serde_json::from_value::<RawEvent>(item.raw_envelope.clone())
                .map_err(|e| e.to_string())
                .and_then(|raw| normalize(&raw).map_err(|e| e.to_string()))
            {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(entity, event_id = %item.event_key, error = %e, "[ls-06] unreadable parked event");
                    continue;
                }
            };

            let outcome = self.apply_locked(&envelope, Some(entity)).await;
            info!(entity, event_id = %item.event_key, ?outcome, "[ls-06] replayed parked event");
        }
        current_parked
    }

    async fn process(&self, raw: &RawEvent) -> ApplyOutcome {
        let key = raw.id.key();
        match self.check_processed(&key).await {
            Ok(true) => return ApplyOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => return self.record_failure(raw, e).await,
        }

        let envelope = match normalize(raw) {
            Ok(envelope) => envelope,
            Err(e) => return self.record_failure(raw, e.into()).await,
        };

        let Some(entity) = envelope.event.entity().map(|e| e.to_string()) else {
            return self.apply_locked(&envelope, None).await;
        };

        let _guard = self.locks.acquire(&entity).await;
        // Another task may have applied it while we waited.
        if matches!(self.check_processed(&key).await, Ok(true)) {
            return ApplyOutcome::Duplicate;
        }
        let current_parked = self.replay_parked(&entity, &key).await;
        self.apply_locked(&envelope, current_parked.then_some(entity.as_str()))
            .await
    }

    /// Run the handler for one event without committing.
    async fn run_handler(&self, envelope: &NormalizedEnvelope) -> Result<Unit, ApplyError> {
        let mut unit = Unit::new(self.store.get_dao().await?);
        let ts = envelope.timestamp_ms;
        match &envelope.event {
            NormalizedEvent::MemberAdded(e) => self.on_member_added(&mut unit, e, ts).await?,
            NormalizedEvent::DataRecordCreated(e) => {
                self.on_data_record_created(&mut unit, e, ts).await?
            }
            NormalizedEvent::ProposalCreated(e) => {
                self.on_proposal_created(&mut unit, e, ts).await?
            }
            NormalizedEvent::VoteCast(e) => self.on_vote_cast(&mut unit, e, ts).await?,
            NormalizedEvent::ProposalExecuted(e) => {
                self.on_proposal_executed(&mut unit, e, ts).await?
            }
            NormalizedEvent::AlertTriggered(e) => self.on_alert_triggered(&mut unit, e, ts).await?,
            NormalizedEvent::Unknown { name } => {
                debug!(event_id = %envelope.id, name = %name, "[ls-06] unknown event kind ignored");
            }
        }
        Ok(unit)
    }
}

#[async_trait]
impl EventApplier for MirrorApplier {
    async fn apply(&self, raw: &RawEvent) -> ApplyOutcome {
        let _timer = time_histogram!(APPLY_DURATION);
        self.process(raw).await
    }

    async fn is_processed(&self, event_key: &str) -> Result<bool, ApplyError> {
        self.check_processed(event_key).await
    }

    fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }
}
