//! # Integer Helpers
//!
//! The chain's JSON encodes `u64`/`u128` values as decimal strings so they
//! survive JavaScript-style number handling. Values are parsed through
//! `U256` first so oversized inputs are reported instead of silently
//! truncated, then narrowed to `u64` at the boundary.

use primitive_types::U256;
use serde::{de, Deserializer, Serializer};
use serde_json::Value;

use crate::errors::IdentifierError;

/// Parse a decimal literal of arbitrary size.
pub fn parse_big_uint(literal: &str) -> Result<U256, IdentifierError> {
    let trimmed = literal.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentifierError::InvalidInteger(literal.to_string()));
    }
    U256::from_dec_str(trimmed).map_err(|_| IdentifierError::InvalidInteger(literal.to_string()))
}

/// Narrow an arbitrary-precision integer to `u64`.
pub fn narrow_u64(value: U256) -> Result<u64, IdentifierError> {
    if value > U256::from(u64::MAX) {
        return Err(IdentifierError::InvalidInteger(value.to_string()));
    }
    Ok(value.low_u64())
}

/// Read a `u64` from a JSON string or number.
pub fn json_u64(value: &Value) -> Result<u64, IdentifierError> {
    match value {
        Value::String(s) => narrow_u64(parse_big_uint(s)?),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| IdentifierError::InvalidInteger(n.to_string())),
        other => Err(IdentifierError::InvalidInteger(other.to_string())),
    }
}

/// Serde adapter: `u64` written as a decimal string, read from either form.
pub mod u64_string {
    use super::*;

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a string or a number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value: Value = serde::Deserialize::deserialize(deserializer)?;
        json_u64(&value).map_err(de::Error::custom)
    }
}

/// Serde adapter for `Option<u64>` in the same encoding.
pub mod opt_u64_string {
    use super::*;

    /// Serialize as an optional decimal string.
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from null, a string or a number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let value: Option<Value> = serde::Deserialize::deserialize(deserializer)?;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => json_u64(&v).map(Some).map_err(de::Error::custom),
        }
    }
}
