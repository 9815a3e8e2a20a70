//! # Query Shapes
//!
//! Filters, pagination and dashboard aggregates for the read API.

use serde::{Deserialize, Serialize};
use shared_types::{ChainAddress, ProposalType, TimestampMs};

use super::entities::{
    Dao, DataRecord, MemberLink, PendingAlertLink, PendingMember, Proposal, SensorType,
    ThresholdConfig,
};
use super::status::ProposalStatus;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Page selection, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: usize,
    /// Items per page.
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageRequest {
    /// A page request, clamped to sane bounds.
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Slice `items` into a page. A page beyond the end is empty.
    pub fn paginate<T>(self, items: Vec<T>) -> Page<T> {
        let req = Self::new(self.page, self.limit);
        let total = items.len();
        let total_pages = total.div_ceil(req.limit);
        let items = items
            .into_iter()
            .skip((req.page - 1).saturating_mul(req.limit))
            .take(req.limit)
            .collect();
        Page {
            items,
            total,
            page: req.page,
            limit: req.limit,
            total_pages,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Items across all pages.
    pub total: usize,
    /// This page number.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Number of pages.
    pub total_pages: usize,
}

/// Member listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFilter {
    /// Only members (or only non-members).
    pub is_member: Option<bool>,
}

/// Proposal listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFilter {
    /// Category.
    pub proposal_type: Option<ProposalType>,
    /// Derived status.
    pub status: Option<ProposalStatus>,
    /// Creating address.
    pub proposer: Option<ChainAddress>,
    /// Address that voted.
    pub voter: Option<ChainAddress>,
    /// Created at or after.
    pub created_from: Option<TimestampMs>,
    /// Created at or before.
    pub created_to: Option<TimestampMs>,
}

impl ProposalFilter {
    /// Whether `p` passes the filter at `now`.
    pub fn matches(&self, p: &Proposal, now: TimestampMs) -> bool {
        self.proposal_type.map_or(true, |t| p.proposal_type == t)
            && self
                .status
                .map_or(true, |s| ProposalStatus::derive(p, now) == s)
            && self.proposer.as_ref().map_or(true, |a| &p.proposer == a)
            && self.voter.as_ref().map_or(true, |a| p.has_voter(a))
            && self.created_from.map_or(true, |t| p.created_at >= t)
            && self.created_to.map_or(true, |t| p.created_at <= t)
    }
}

/// Data record listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecordFilter {
    /// Sensor type id.
    pub sensor_type: Option<u8>,
    /// Submitting address.
    pub submitter: Option<ChainAddress>,
    /// Alert flag.
    pub triggered_alert: Option<bool>,
    /// Value at or above.
    pub min_value: Option<u64>,
    /// Value at or below.
    pub max_value: Option<u64>,
    /// Submitted at or after.
    pub from: Option<TimestampMs>,
    /// Submitted at or before.
    pub to: Option<TimestampMs>,
}

impl DataRecordFilter {
    /// Whether `r` passes the filter.
    pub fn matches(&self, r: &DataRecord) -> bool {
        self.sensor_type.map_or(true, |s| r.sensor_type == s)
            && self.submitter.as_ref().map_or(true, |a| &r.submitter == a)
            && self.triggered_alert.map_or(true, |f| r.triggered_alert == f)
            && self.min_value.map_or(true, |v| r.value >= v)
            && self.max_value.map_or(true, |v| r.value <= v)
            && self.from.map_or(true, |t| r.timestamp >= t)
            && self.to.map_or(true, |t| r.timestamp <= t)
    }
}

/// Count for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Items that day.
    pub count: u64,
}

/// Aggregates for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Linked members with `is_member = true`.
    pub total_members: u64,
    /// All proposals.
    pub total_proposals: u64,
    /// Proposals with open voting windows.
    pub active_proposals: u64,
    /// Executed proposals.
    pub executed_proposals: u64,
    /// Executed and approved proposals.
    pub approved_proposals: u64,
    /// All data records.
    pub total_data_records: u64,
    /// Records that triggered an alert.
    pub alert_records: u64,
    /// Cached treasury balance.
    pub treasury_balance: u64,
    /// Proposals created per day, last 30 days.
    pub proposals_by_day: Vec<DailyCount>,
    /// Records submitted per day, last 30 days.
    pub records_by_day: Vec<DailyCount>,
    /// Alerts per day, last 30 days.
    pub alerts_by_day: Vec<DailyCount>,
}

/// Version-free copy of the mirror, for comparing two runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirrorSnapshot {
    /// DAO singleton.
    pub dao: Option<Dao>,
    /// Member links by address.
    pub members: Vec<MemberLink>,
    /// Pending members by address.
    pub pending_members: Vec<PendingMember>,
    /// Proposals by id.
    pub proposals: Vec<Proposal>,
    /// Data records by id.
    pub records: Vec<DataRecord>,
    /// Pending alert links by record id.
    pub pending_alerts: Vec<PendingAlertLink>,
    /// Sensor types by id.
    pub sensor_types: Vec<SensorType>,
    /// Thresholds by sensor id.
    pub thresholds: Vec<ThresholdConfig>,
}
