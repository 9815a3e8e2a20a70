//! # Query Service
//!
//! Read-only API over the mirror for the route layer.
//!
//! Proposal status is derived at read time from the clock, so a proposal
//! turns from `active` to `expired` without any write. The treasury balance
//! is read from the chain and falls back to the mirror's cached value when
//! the chain is unreachable.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use shared_types::{ChainAddress, Clock, ErrorKind, EventCursor, ObjectId, TimestampMs};

use ls_01_chain_client::ChainClient;
use ls_02_tx_builder::format_amount;
use ls_03_mirror_store::{
    DashboardStats, Dao, DataRecord, DataRecordFilter, DeadLetter, MemberFilter, MemberLink,
    MirrorStore, Page, PageRequest, Proposal, ProposalFilter, ProposalStatus, SensorType,
    ThresholdConfig,
};
use ls_05_event_ingestor::{EventIngestorApi, IngestorStatus};
use ls_06_mirror_applier::treasury_balance;

use crate::errors::ServiceError;

/// A proposal with its derived status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
    /// Stored proposal.
    #[serde(flatten)]
    pub proposal: Proposal,
    /// Status at the time of the read.
    pub status: ProposalStatus,
}

impl ProposalView {
    fn at(proposal: Proposal, now: TimestampMs) -> Self {
        let status = ProposalStatus::derive(&proposal, now);
        Self { proposal, status }
    }
}

/// Where a treasury figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSource {
    /// Read from the DAO object just now.
    Chain,
    /// The mirror's cached value.
    Mirror,
}

/// Treasury balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryBalance {
    /// Base units.
    pub balance: u64,
    /// Decimal rendering.
    pub formatted: String,
    /// Origin of the figure.
    pub source: BalanceSource,
    /// When the cached value was last refreshed (mirror source only).
    pub refreshed_at: Option<TimestampMs>,
}

/// Ingestor status plus mirror bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    /// State machine status.
    #[serde(flatten)]
    pub ingestor: IngestorStatus,
    /// Highest applied stream position.
    pub last_cursor: Option<EventCursor>,
    /// Events in the persisted processed log.
    pub processed_total: u64,
    /// Error that last stopped the ingestor.
    pub last_error: Option<String>,
    /// Taxonomy of `last_error`.
    pub last_error_kind: Option<ErrorKind>,
}

/// Read-only mirror queries.
pub struct QueryService {
    store: Arc<dyn MirrorStore>,
    chain: Arc<dyn ChainClient>,
    ingestor: Arc<dyn EventIngestorApi>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    /// Create the service.
    pub fn new(
        store: Arc<dyn MirrorStore>,
        chain: Arc<dyn ChainClient>,
        ingestor: Arc<dyn EventIngestorApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            chain,
            ingestor,
            clock,
        }
    }

    // === Members ===

    /// Members, oldest link first.
    pub async fn list_members(
        &self,
        filter: &MemberFilter,
        page: PageRequest,
    ) -> Result<Page<MemberLink>, ServiceError> {
        Ok(self.store.list_members(filter, page).await?)
    }

    /// Member linked to `addr`.
    pub async fn get_member(&self, addr: &str) -> Result<MemberLink, ServiceError> {
        let addr = parse_id("addr", addr)?;
        self.store
            .get_member(&addr)
            .await?
            .ok_or_else(|| not_found("member", addr.as_str()))
    }

    /// Member linked to application user `user_id`.
    pub async fn get_member_by_user(&self, user_id: &str) -> Result<MemberLink, ServiceError> {
        self.store
            .get_member_by_user(user_id)
            .await?
            .ok_or_else(|| not_found("member", user_id))
    }

    // === Proposals ===

    /// Proposals matching `filter`, with status derived now.
    pub async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<ProposalView>, ServiceError> {
        let now = self.clock.now_ms();
        let found = self.store.list_proposals(filter, now, page).await?;
        Ok(Page {
            items: found
                .items
                .into_iter()
                .map(|p| ProposalView::at(p, now))
                .collect(),
            total: found.total,
            page: found.page,
            limit: found.limit,
            total_pages: found.total_pages,
        })
    }

    /// Proposal by object id.
    pub async fn get_proposal(&self, id: &str) -> Result<ProposalView, ServiceError> {
        let id = parse_id("proposalId", id)?;
        let proposal = self
            .store
            .get_proposal(&id)
            .await?
            .ok_or_else(|| not_found("proposal", id.as_str()))?;
        Ok(ProposalView::at(proposal, self.clock.now_ms()))
    }

    /// Proposal by its on-chain sequence number.
    pub async fn get_proposal_by_seq(&self, seq_id: u64) -> Result<ProposalView, ServiceError> {
        let proposal = self
            .store
            .get_proposal_by_seq(seq_id)
            .await?
            .ok_or_else(|| not_found("proposal", &seq_id.to_string()))?;
        Ok(ProposalView::at(proposal, self.clock.now_ms()))
    }

    // === Data records ===

    /// Data records matching `filter`.
    pub async fn list_data_records(
        &self,
        filter: &DataRecordFilter,
        page: PageRequest,
    ) -> Result<Page<DataRecord>, ServiceError> {
        Ok(self.store.list_data_records(filter, page).await?)
    }

    /// Data record by object id.
    pub async fn get_data_record(&self, id: &str) -> Result<DataRecord, ServiceError> {
        let id = parse_id("recordId", id)?;
        self.store
            .get_data_record(&id)
            .await?
            .ok_or_else(|| not_found("data record", id.as_str()))
    }

    // === DAO ===

    /// The DAO singleton.
    pub async fn get_dao_info(&self) -> Result<Dao, ServiceError> {
        self.store.get_dao().await?.ok_or(ServiceError::NotBootstrapped)
    }

    /// Aggregates for the dashboard.
    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        Ok(self.store.dashboard_stats(self.clock.now_ms()).await?)
    }

    /// Sensor thresholds.
    pub async fn get_thresholds(&self) -> Result<Vec<ThresholdConfig>, ServiceError> {
        Ok(self.store.thresholds().await?)
    }

    /// Sensor catalogue.
    pub async fn get_sensor_types(&self) -> Result<Vec<SensorType>, ServiceError> {
        Ok(self.store.sensor_types().await?)
    }

    /// Treasury balance from the chain, or the cached value when the chain
    /// cannot be reached.
    pub async fn get_treasury_balance(&self) -> Result<TreasuryBalance, ServiceError> {
        let dao = self.get_dao_info().await?;
        match self.chain.get_object(&dao.dao_id).await {
            Ok(Some(object)) => match treasury_balance(&object)? {
                Some(balance) => Ok(TreasuryBalance {
                    balance,
                    formatted: format_amount(balance),
                    source: BalanceSource::Chain,
                    refreshed_at: None,
                }),
                None => {
                    debug!(dao = %dao.dao_id, "DAO object carries no treasury; using mirror");
                    Ok(cached(&dao))
                }
            },
            Ok(None) => Err(not_found("DAO object", dao.dao_id.as_str())),
            Err(e) if e.kind() == ErrorKind::Network => {
                warn!(dao = %dao.dao_id, error = %e, "Treasury read failed; serving cached balance");
                Ok(cached(&dao))
            }
            Err(e) => Err(e.into()),
        }
    }

    // === Pipeline ===

    /// Ingestor state and mirror bookkeeping.
    pub async fn get_event_listener_status(&self) -> Result<ListenerStatus, ServiceError> {
        let last_cursor = self.store.get_dao().await?.and_then(|d| d.last_cursor);
        let last_error = self.ingestor.last_error();
        Ok(ListenerStatus {
            ingestor: self.ingestor.status(),
            last_cursor,
            processed_total: self.store.processed_total().await?,
            last_error_kind: last_error.as_ref().map(|e| e.kind()),
            last_error: last_error.map(|e| e.to_string()),
        })
    }

    /// Events moved aside after exhausting their retry budget.
    pub async fn list_dead_letters(
        &self,
        page: PageRequest,
    ) -> Result<Page<DeadLetter>, ServiceError> {
        Ok(self.store.list_dead_letters(page).await?)
    }

    /// One dead letter by event key (`txDigest#eventSeq`).
    pub async fn get_dead_letter(&self, event_key: &str) -> Result<DeadLetter, ServiceError> {
        self.store
            .get_dead_letter(event_key)
            .await?
            .ok_or_else(|| not_found("dead letter", event_key))
    }
}

fn cached(dao: &Dao) -> TreasuryBalance {
    TreasuryBalance {
        balance: dao.treasury_balance,
        formatted: format_amount(dao.treasury_balance),
        source: BalanceSource::Mirror,
        refreshed_at: dao.treasury_refreshed_at,
    }
}

fn not_found(entity: &'static str, key: &str) -> ServiceError {
    ServiceError::NotFound {
        entity,
        key: key.to_string(),
    }
}

pub(crate) fn parse_id(field: &'static str, raw: &str) -> Result<ObjectId, ServiceError> {
    ChainAddress::parse(raw).map_err(|e| ServiceError::InvalidInput {
        field,
        reason: e.to_string(),
    })
}
