//! # Event Stream Types
//!
//! Raw event envelopes as delivered by `suix_queryEvents` and
//! `suix_subscribeEvent`, plus query and paging shapes.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use shared_types::serde_helpers::u64_string;
use shared_types::{EventId, ObjectId};

/// A chain event before normalization.
///
/// Unknown envelope fields are ignored. `timestamp_ms` is kept as the
/// decimal literal the node sent so the normalizer can parse it without
/// losing precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Transaction digest and event index.
    pub id: EventId,
    /// Fully qualified Move type, `0xpkg::module::Name`.
    #[serde(rename = "type")]
    pub type_: String,
    /// Emitting package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    /// Emitting module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_module: Option<String>,
    /// Transaction sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Event payload as JSON.
    #[serde(default)]
    pub parsed_json: Value,
    /// Event timestamp as a decimal literal.
    #[serde(
        default,
        deserialize_with = "decimal_literal",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_ms: Option<String>,
}

fn decimal_literal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected timestamp string or number, got {other}"
        ))),
    }
}

impl RawEvent {
    /// Build an envelope. Used by mocks and tests.
    pub fn new(type_: impl Into<String>, id: EventId, timestamp_ms: u64, parsed_json: Value) -> Self {
        Self {
            id,
            type_: type_.into(),
            package_id: None,
            transaction_module: None,
            sender: None,
            parsed_json,
            timestamp_ms: Some(timestamp_ms.to_string()),
        }
    }

    /// The event name: the segment after the last `::`.
    pub fn kind_name(&self) -> &str {
        let base = self.type_.split('<').next().unwrap_or(&self.type_);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Event filter in the node's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    /// Events emitted by one module of a package.
    MoveModule {
        /// Package id
        package: ObjectId,
        /// Module name
        module: String,
    },
    /// Events emitted by any module of a package.
    Package(ObjectId),
}

impl EventFilter {
    /// Whether an envelope falls under the filter, judged by its type tag.
    pub fn matches(&self, event: &RawEvent) -> bool {
        match self {
            EventFilter::MoveModule { package, module } => event
                .type_
                .starts_with(&format!("{}::{}::", package, module)),
            EventFilter::Package(package) => event.type_.starts_with(&format!("{}::", package)),
        }
    }
}

/// Page ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first (chain order).
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// One `suix_queryEvents` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Which events to return.
    pub filter: EventFilter,
    /// Exclusive start position; `None` starts at the beginning (or end,
    /// when descending).
    pub cursor: Option<EventId>,
    /// Page size.
    pub limit: usize,
    /// Direction.
    pub order: SortOrder,
}

/// One page of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    /// Events in the requested order.
    pub data: Vec<RawEvent>,
    /// Whether another page follows `next_cursor`.
    pub has_next_page: bool,
    /// Position to resume from.
    #[serde(default)]
    pub next_cursor: Option<EventId>,
}

/// Gas charged by an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCostSummary {
    /// Computation cost in base units.
    #[serde(with = "u64_string")]
    pub computation_cost: u64,
    /// Storage cost in base units.
    #[serde(with = "u64_string")]
    pub storage_cost: u64,
    /// Storage rebate in base units.
    #[serde(with = "u64_string")]
    pub storage_rebate: u64,
}

impl GasCostSummary {
    /// Net gas: computation plus storage minus rebate, floored at zero.
    pub fn net(&self) -> u64 {
        (self.computation_cost + self.storage_cost).saturating_sub(self.storage_rebate)
    }
}

/// Result of `sui_dryRunTransactionBlock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunEffects {
    /// Whether the simulated execution succeeded.
    pub success: bool,
    /// Abort message when it did not.
    pub error: Option<String>,
    /// Gas the execution would use.
    pub gas_used: GasCostSummary,
}

/// Result of `sui_devInspectTransactionBlock`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DevInspectResults {
    /// Abort message, if execution failed.
    pub error: Option<String>,
    /// BCS-encoded return values of each command, with their Move type.
    pub return_values: Vec<(Vec<u8>, String)>,
}
