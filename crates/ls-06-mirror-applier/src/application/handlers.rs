//! # Event Handlers
//!
//! One handler per event kind. Handlers only read and stage writes into a
//! [`Unit`]; the service commits. Each handler is idempotent: replaying an
//! event against a mirror that already reflects it stages nothing.

use ls_03_mirror_store::{
    ConfigChange, MemberDetails, MirrorWrite, PendingAlertLink, PendingMember, Proposal,
    ThresholdConfig, Voter,
};
use ls_04_event_normalizer::{
    AlertTriggered, DataRecordCreated, EntityKey, MemberAdded, ProposalCreated, ProposalExecuted,
    VoteCast,
};
use shared_types::{ObjectId, ProposalType, TimestampMs};
use tracing::{debug, warn};

use super::service::{MirrorApplier, Unit};
use crate::domain::{data_record_from_object, proposal_from_object, treasury_balance, ApplyError};

impl MirrorApplier {
    pub(super) async fn on_member_added(
        &self,
        unit: &mut Unit,
        e: &MemberAdded,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        let details = MemberDetails {
            name: e.name.clone(),
            joined_at: ts,
            voting_power: e.voting_power,
        };

        match self.store.get_member(&e.member).await? {
            Some(link) if link.is_member => {}
            Some(mut link) => {
                link.is_member = true;
                link.member_details = Some(details);
                let dao = unit.dao_mut()?;
                dao.member_count = incremented(dao.member_count, 1, "member_count")?;
                unit.push(MirrorWrite::Member(link));
            }
            None => {
                // Member added on chain before the user linked the address.
                if self.store.get_pending_member(&e.member).await?.is_none() {
                    unit.push(MirrorWrite::PendingMember(PendingMember {
                        addr: e.member.clone(),
                        details,
                    }));
                }
            }
        }
        Ok(())
    }

    pub(super) async fn on_data_record_created(
        &self,
        unit: &mut Unit,
        e: &DataRecordCreated,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        if self.store.get_data_record(&e.record_id).await?.is_some() {
            return Ok(());
        }

        let object = self
            .fetch(&e.record_id, EntityKey::Record(e.record_id.clone()))
            .await?;
        let mut record = data_record_from_object(&object, e, ts)?;

        if let Some(link) = self.store.get_pending_alert(&e.record_id).await? {
            record.triggered_alert = true;
            record.alert_proposal = Some(link.proposal_id);
            unit.push(MirrorWrite::ClearPendingAlert(e.record_id.clone()));
        }

        if record.triggered_alert {
            if let Some(threshold) = self.store.get_threshold(record.sensor_type).await? {
                if threshold.contains(record.value) {
                    warn!(
                        record = %record.object_id,
                        value = record.value,
                        min = threshold.min_value,
                        max = threshold.max_value,
                        "[ls-06] alert flagged for an in-range value"
                    );
                }
            }
        }

        if let Some(dao) = unit.dao.as_mut() {
            if e.seq_id >= dao.next_data_id {
                dao.next_data_id = incremented(e.seq_id, 1, "next_data_id")?;
                unit.dao_dirty = true;
            }
        }
        unit.push(MirrorWrite::DataRecord(record));
        Ok(())
    }

    pub(super) async fn on_proposal_created(
        &self,
        unit: &mut Unit,
        e: &ProposalCreated,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        if self.store.get_proposal(&e.proposal_id).await?.is_some() {
            return Ok(());
        }

        let object = self
            .fetch(&e.proposal_id, EntityKey::Proposal(e.proposal_id.clone()))
            .await?;
        let proposal = proposal_from_object(&object, Some(e), ts)?;
        bump_proposal_seq(unit, proposal.seq_id)?;
        unit.push(MirrorWrite::Proposal(proposal));
        Ok(())
    }

    /// The mirrored proposal, or one materialized from the chain when its
    /// creation event has not been applied yet. The flag is true for the
    /// latter, which must be written even if the caller changes nothing.
    async fn load_proposal(
        &self,
        unit: &mut Unit,
        id: &ObjectId,
        ts: TimestampMs,
    ) -> Result<(Proposal, bool), ApplyError> {
        if let Some(existing) = self.store.get_proposal(id).await? {
            return Ok((existing, false));
        }
        let object = self.fetch(id, EntityKey::Proposal(id.clone())).await?;
        let proposal = proposal_from_object(&object, None, ts)?;
        debug!(proposal = %id, "[ls-06] proposal materialized from chain");
        bump_proposal_seq(unit, proposal.seq_id)?;
        Ok((proposal, true))
    }

    pub(super) async fn on_vote_cast(
        &self,
        unit: &mut Unit,
        e: &VoteCast,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        let (mut proposal, mut dirty) = self.load_proposal(unit, &e.proposal_id, ts).await?;

        if proposal.has_voter(&e.voter) {
            debug!(proposal = %e.proposal_id, voter = %e.voter, "[ls-06] repeat vote ignored");
        } else {
            proposal.voters.push(Voter {
                addr: e.voter.clone(),
                vote: e.vote,
                power: e.voting_power,
                voted_at: ts,
            });
            if e.vote {
                proposal.yes_votes = incremented(proposal.yes_votes, e.voting_power, "yes_votes")?;
            } else {
                proposal.no_votes = incremented(proposal.no_votes, e.voting_power, "no_votes")?;
            }
            dirty = true;
        }

        if dirty {
            unit.push(MirrorWrite::Proposal(proposal));
        }
        Ok(())
    }

    pub(super) async fn on_proposal_executed(
        &self,
        unit: &mut Unit,
        e: &ProposalExecuted,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        let (mut proposal, fresh) = self.load_proposal(unit, &e.proposal_id, ts).await?;

        if proposal.executed {
            if fresh {
                unit.push(MirrorWrite::Proposal(proposal));
            }
            return Ok(());
        }

        proposal.executed = true;
        proposal.approved = Some(e.approved);
        proposal.yes_votes = e.yes_votes;
        proposal.no_votes = e.no_votes;
        proposal.executed_at = Some(ts);

        if e.approved && proposal.proposal_type == ProposalType::Configuration {
            if let Some(change) = proposal.config_change.clone() {
                self.stage_threshold_change(unit, &change, &proposal.object_id, ts)
                    .await?;
            }
        }

        unit.push(MirrorWrite::Proposal(proposal));
        self.refresh_treasury(unit, ts).await;
        Ok(())
    }

    async fn stage_threshold_change(
        &self,
        unit: &mut Unit,
        change: &ConfigChange,
        proposal: &ObjectId,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        if change.min_value >= change.max_value {
            warn!(
                proposal = %proposal,
                sensor = change.sensor_type,
                min = change.min_value,
                max = change.max_value,
                "[ls-06] configuration change rejected: min must be below max"
            );
            return Ok(());
        }

        let threshold = match self.store.get_threshold(change.sensor_type).await? {
            Some(current) => ThresholdConfig {
                min_value: change.min_value,
                max_value: change.max_value,
                updated_at: ts,
                ..current
            },
            None => ThresholdConfig {
                sensor_type_id: change.sensor_type,
                min_value: change.min_value,
                max_value: change.max_value,
                description: format!("Set by proposal {}", proposal.short()),
                active: true,
                updated_at: ts,
                version: 0,
            },
        };
        unit.push(MirrorWrite::Threshold(threshold));
        Ok(())
    }

    /// Re-read the treasury from the DAO object. The mirror value is a
    /// cache, so a failed read leaves it untouched.
    async fn refresh_treasury(&self, unit: &mut Unit, ts: TimestampMs) {
        let Some(dao_id) = unit.dao.as_ref().map(|d| d.dao_id.clone()) else {
            return;
        };

        let balance = match self.chain.get_object(&dao_id).await {
            Ok(Some(object)) => treasury_balance(&object),
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        };
        match balance {
            Ok(Some(balance)) => {
                if let Ok(dao) = unit.dao_mut() {
                    dao.treasury_balance = balance;
                    dao.treasury_refreshed_at = Some(ts);
                }
            }
            Ok(None) => debug!(dao = %dao_id, "[ls-06] DAO object has no treasury field"),
            Err(e) => warn!(dao = %dao_id, error = %e, "[ls-06] treasury refresh failed"),
        }
    }

    pub(super) async fn on_alert_triggered(
        &self,
        unit: &mut Unit,
        e: &AlertTriggered,
        ts: TimestampMs,
    ) -> Result<(), ApplyError> {
        match self.store.get_data_record(&e.record_id).await? {
            Some(mut record) => {
                if record.triggered_alert && record.alert_proposal.as_ref() == Some(&e.proposal_id) {
                    return Ok(());
                }
                record.triggered_alert = true;
                record.alert_proposal = Some(e.proposal_id.clone());
                unit.push(MirrorWrite::DataRecord(record));
            }
            None => {
                let staged = self.store.get_pending_alert(&e.record_id).await?;
                if staged.is_some_and(|link| link.proposal_id == e.proposal_id) {
                    return Ok(());
                }
                unit.push(MirrorWrite::PendingAlert(PendingAlertLink {
                    record_id: e.record_id.clone(),
                    proposal_id: e.proposal_id.clone(),
                    sensor_type: e.sensor_type,
                    value: e.value,
                    threshold: e.threshold,
                    staged_at: ts,
                }));
            }
        }
        Ok(())
    }
}

fn bump_proposal_seq(unit: &mut Unit, seq_id: u64) -> Result<(), ApplyError> {
    if let Some(dao) = unit.dao.as_mut() {
        if seq_id >= dao.next_proposal_id {
            dao.next_proposal_id = incremented(seq_id, 1, "next_proposal_id")?;
            unit.dao_dirty = true;
        }
    }
    Ok(())
}

fn incremented(value: u64, by: u64, field: &'static str) -> Result<u64, ApplyError> {
    value
        .checked_add(by)
        .ok_or(ApplyError::Overflow { field })
}
