//! Payload field readers.
//!
//! Each reader accepts a list of candidate names so contract renames
//! (`voting_power` / `power`) do not break ingestion.

use primitive_types::U256;
use serde_json::Value;
use shared_types::serde_helpers::{narrow_u64, parse_big_uint};
use shared_types::ChainAddress;

use crate::domain::NormalizeError;

pub(crate) struct Payload<'a> {
    kind: &'a str,
    json: &'a Value,
}

impl<'a> Payload<'a> {
    pub(crate) fn new(kind: &'a str, json: &'a Value) -> Self {
        Self { kind, json }
    }

    fn lookup(&self, names: &[&str]) -> Option<(&'a Value, String)> {
        names.iter().find_map(|name| match self.json.get(*name) {
            None | Some(Value::Null) => None,
            Some(v) => Some((v, (*name).to_string())),
        })
    }

    fn missing(&self, names: &[&str]) -> NormalizeError {
        NormalizeError::MissingField {
            kind: self.kind.to_string(),
            field: names.first().copied().unwrap_or_default().to_string(),
        }
    }

    fn invalid(&self, field: String, reason: impl Into<String>) -> NormalizeError {
        NormalizeError::InvalidField {
            kind: self.kind.to_string(),
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn big_uint(&self, names: &[&str]) -> Result<Option<U256>, NormalizeError> {
        let Some((value, field)) = self.lookup(names) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::String(s) => parse_big_uint(s).map_err(|e| self.invalid(field, e.to_string()))?,
            Value::Number(n) => match n.as_u64() {
                Some(v) => U256::from(v),
                None => return Err(self.invalid(field, format!("not an unsigned integer: {n}"))),
            },
            other => return Err(self.invalid(field, format!("expected integer, got {other}"))),
        };
        Ok(Some(parsed))
    }

    pub(crate) fn opt_u64(&self, names: &[&str]) -> Result<Option<u64>, NormalizeError> {
        match self.big_uint(names)? {
            None => Ok(None),
            Some(v) => narrow_u64(v)
                .map(Some)
                .map_err(|e| self.invalid(names[0].to_string(), e.to_string())),
        }
    }

    pub(crate) fn u64(&self, names: &[&str]) -> Result<u64, NormalizeError> {
        self.opt_u64(names)?.ok_or_else(|| self.missing(names))
    }

    pub(crate) fn u8(&self, names: &[&str]) -> Result<u8, NormalizeError> {
        let v = self.u64(names)?;
        u8::try_from(v).map_err(|_| self.invalid(names[0].to_string(), format!("{v} exceeds 255")))
    }

    pub(crate) fn bool(&self, names: &[&str]) -> Result<bool, NormalizeError> {
        let (value, field) = self.lookup(names).ok_or_else(|| self.missing(names))?;
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s == "true" => Ok(true),
            Value::String(s) if s == "false" => Ok(false),
            other => Err(self.invalid(field, format!("expected bool, got {other}"))),
        }
    }

    pub(crate) fn opt_bool(&self, names: &[&str]) -> Result<Option<bool>, NormalizeError> {
        if self.lookup(names).is_none() {
            return Ok(None);
        }
        self.bool(names).map(Some)
    }

    pub(crate) fn string(&self, names: &[&str]) -> Result<String, NormalizeError> {
        let (value, field) = self.lookup(names).ok_or_else(|| self.missing(names))?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Array(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                    .collect();
                let bytes = bytes.ok_or_else(|| self.invalid(field.clone(), "bad byte array"))?;
                String::from_utf8(bytes).map_err(|e| self.invalid(field, e.to_string()))
            }
            other => Err(self.invalid(field, format!("expected string, got {other}"))),
        }
    }

    pub(crate) fn address(&self, names: &[&str]) -> Result<ChainAddress, NormalizeError> {
        let (value, field) = self.lookup(names).ok_or_else(|| self.missing(names))?;
        match value {
            Value::String(s) => ChainAddress::parse(s).map_err(|e| self.invalid(field, e.to_string())),
            other => Err(self.invalid(field, format!("expected address, got {other}"))),
        }
    }
}
