//! # Core Identifiers
//!
//! Identifiers that cross subsystem boundaries.
//!
//! ## Clusters
//!
//! - **Chain identity**: [`ChainAddress`], [`ObjectId`], [`Network`]
//! - **Event stream**: [`EventId`], [`EventCursor`]
//! - **Governance**: [`ProposalType`]

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::IdentifierError;
use crate::serde_helpers::u64_string;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

// =============================================================================
// CLUSTER A: CHAIN IDENTITY
// =============================================================================

/// A 32-byte account or object address in canonical text form:
/// `0x` followed by exactly 64 lowercase hex digits.
///
/// Construction always goes through [`ChainAddress::parse`], so two values
/// compare equal iff they denote the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChainAddress(String);

/// Object ids share the address space.
pub type ObjectId = ChainAddress;

impl ChainAddress {
    /// Number of hex digits in the canonical form.
    pub const HEX_LEN: usize = 64;

    /// Canonicalize an address.
    ///
    /// Accepts an optional `0x`/`0X` prefix, any case, and short forms
    /// (left-padded with zeros, so `0x6` is the clock object).
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(IdentifierError::EmptyAddress);
        }
        if digits.len() > Self::HEX_LEN {
            return Err(IdentifierError::AddressTooLong { len: digits.len() });
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdentifierError::InvalidHex {
                input: input.to_string(),
            });
        }

        let mut canonical = String::with_capacity(2 + Self::HEX_LEN);
        canonical.push_str("0x");
        for _ in digits.len()..Self::HEX_LEN {
            canonical.push('0');
        }
        canonical.push_str(&digits.to_ascii_lowercase());
        Ok(Self(canonical))
    }

    /// Build from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The all-zero address.
    #[must_use]
    pub fn zero() -> Self {
        Self::from_bytes([0u8; 32])
    }

    /// Canonical text form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 32 bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Canonical form guarantees 64 valid hex digits after the prefix.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }

    /// Abbreviated form for log lines (`0x1234…abcd`).
    #[must_use]
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainAddress {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ChainAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Chain network the deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    #[default]
    Testnet,
    /// Developer network (reset periodically).
    Devnet,
    /// Local validator.
    Localnet,
}

impl Network {
    /// Default public full-node RPC endpoint for the network.
    #[must_use]
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Network::Testnet => "https://fullnode.testnet.sui.io:443",
            Network::Devnet => "https://fullnode.devnet.sui.io:443",
            Network::Localnet => "http://127.0.0.1:9000",
        }
    }

    /// Lowercase tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "localnet" => Ok(Network::Localnet),
            other => Err(IdentifierError::UnknownNetwork(other.to_string())),
        }
    }
}

// =============================================================================
// CLUSTER B: EVENT STREAM
// =============================================================================

/// Chain-assigned event identity: the emitting transaction and the event's
/// index within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventId {
    /// Digest of the transaction that emitted the event.
    pub tx_digest: String,
    /// Index of the event within the transaction.
    #[serde(with = "u64_string")]
    pub event_seq: u64,
}

impl EventId {
    /// Create an event id.
    pub fn new(tx_digest: impl Into<String>, event_seq: u64) -> Self {
        Self {
            tx_digest: tx_digest.into(),
            event_seq,
        }
    }

    /// Storage key: `txDigest#eventSeq`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}#{}", self.tx_digest, self.event_seq)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_digest, self.event_seq)
    }
}

/// A position in the event stream.
///
/// The chain treats `(txDigest, eventSeq)` as opaque; the event timestamp is
/// kept alongside so cursors can be compared for the monotonic high-water
/// mark. Ordering is `(timestamp_ms, event_seq, tx_digest)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCursor {
    /// Event the cursor points at.
    pub id: EventId,
    /// Timestamp of that event.
    pub timestamp_ms: TimestampMs,
}

impl EventCursor {
    /// Create a cursor.
    #[must_use]
    pub fn new(id: EventId, timestamp_ms: TimestampMs) -> Self {
        Self { id, timestamp_ms }
    }

    /// The later of two cursors.
    #[must_use]
    pub fn max_of(current: Option<&EventCursor>, candidate: &EventCursor) -> EventCursor {
        match current {
            Some(c) if c >= candidate => c.clone(),
            _ => candidate.clone(),
        }
    }
}

impl PartialOrd for EventCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then(self.id.event_seq.cmp(&other.id.event_seq))
            .then_with(|| self.id.tx_digest.cmp(&other.id.tx_digest))
    }
}

// =============================================================================
// CLUSTER C: GOVERNANCE
// =============================================================================

/// Proposal category as encoded by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    /// Free-form governance proposal.
    General = 0,
    /// Created by the contract when a data record breaches its threshold.
    Alert = 1,
    /// Changes a sensor threshold when approved.
    Configuration = 2,
}

impl ProposalType {
    /// Numeric encoding used on chain.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether end users may create this type directly.
    ///
    /// Alert proposals are created by the contract only.
    #[must_use]
    pub fn is_user_creatable(self) -> bool {
        !matches!(self, ProposalType::Alert)
    }
}

impl TryFrom<u64> for ProposalType {
    type Error = IdentifierError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProposalType::General),
            1 => Ok(ProposalType::Alert),
            2 => Ok(ProposalType::Configuration),
            other => Err(IdentifierError::InvalidProposalType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_pads_short_address() {
        let addr = ChainAddress::parse("0x1").unwrap();
        assert_eq!(addr.as_str().len(), 66);
        assert!(addr.as_str().ends_with("01"));
        assert!(addr.as_str().starts_with("0x0000"));
    }

    #[test]
    fn test_parse_lowercases_and_accepts_missing_prefix() {
        let a = ChainAddress::parse("ABCDEF").unwrap();
        let b = ChainAddress::parse("0xabcdef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(ChainAddress::parse("0x"), Err(IdentifierError::EmptyAddress));
        assert!(matches!(
            ChainAddress::parse("0xzz"),
            Err(IdentifierError::InvalidHex { .. })
        ));
        let long = format!("0x{}", "1".repeat(65));
        assert!(matches!(
            ChainAddress::parse(&long),
            Err(IdentifierError::AddressTooLong { len: 65 })
        ));
    }

    #[test]
    fn test_address_deserialize_canonicalizes() {
        let addr: ChainAddress = serde_json::from_str("\"0xA\"").unwrap();
        assert_eq!(addr, ChainAddress::parse("0x0a").unwrap());
        assert!(serde_json::from_str::<ChainAddress>("\"nope\"").is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let addr = ChainAddress::parse("0xdeadbeef").unwrap();
        assert_eq!(ChainAddress::from_bytes(addr.to_bytes()), addr);
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("moonnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_event_id_wire_format() {
        let id: EventId =
            serde_json::from_str(r#"{"txDigest":"Abc","eventSeq":"3"}"#).unwrap();
        assert_eq!(id, EventId::new("Abc", 3));
        assert_eq!(id.key(), "Abc#3");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["eventSeq"], "3");
    }

    #[test]
    fn test_cursor_ordering_and_max() {
        let early = EventCursor::new(EventId::new("b", 0), 1000);
        let late = EventCursor::new(EventId::new("a", 0), 2000);
        let same_tx_next = EventCursor::new(EventId::new("b", 1), 1000);
        assert!(early < late);
        assert!(early < same_tx_next);
        assert_eq!(EventCursor::max_of(Some(&late), &early), late);
        assert_eq!(EventCursor::max_of(None, &early), early);
    }

    #[test]
    fn test_proposal_type() {
        assert_eq!(ProposalType::try_from(2).unwrap(), ProposalType::Configuration);
        assert!(ProposalType::try_from(3).is_err());
        assert!(!ProposalType::Alert.is_user_creatable());
        assert!(ProposalType::General.is_user_creatable());
    }

    proptest! {
        #[test]
        fn prop_canonical_form_is_fixed_point(bytes in proptest::array::uniform32(any::<u8>())) {
            let addr = ChainAddress::from_bytes(bytes);
            let reparsed = ChainAddress::parse(&addr.as_str().to_ascii_uppercase().replacen("0X", "0x", 1)).unwrap();
            prop_assert_eq!(reparsed, addr);
        }

        #[test]
        fn prop_parse_output_is_canonical(digits in "[0-9a-fA-F]{1,64}") {
            let addr = ChainAddress::parse(&digits).unwrap();
            prop_assert_eq!(addr.as_str().len(), 66);
            prop_assert!(addr.as_str()[2..].bytes().all(|b| !b.is_ascii_uppercase()));
        }
    }
}
