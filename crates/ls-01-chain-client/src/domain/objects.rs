//! # Object Views
//!
//! A typed view over the `content.fields` map returned by `sui_getObject`.
//! The reader tolerates unknown fields and the node's wrapping of Move
//! values (`Balance` as `{"fields":{"value":..}}`, `Option` as
//! `{"vec":[..]}`, `UID` as `{"id":..}`).

use serde_json::{Map, Value};
use shared_types::serde_helpers::json_u64;
use shared_types::{ChainAddress, ObjectId};

use super::errors::ChainClientError;

/// Fields of an on-chain Move object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFields {
    /// Object id.
    pub object_id: ObjectId,
    /// Object version.
    pub version: u64,
    /// Move type, when the node reported one.
    pub type_: Option<String>,
    fields: Map<String, Value>,
}

/// Strip the node's wrappers around Move values.
fn unwrap_move_value(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            if let Some(vec) = map.get("vec").and_then(Value::as_array) {
                return vec.first().and_then(unwrap_move_value);
            }
            if let Some(inner) = map.get("fields").and_then(|f| f.get("value")) {
                return unwrap_move_value(inner);
            }
            if let Some(id) = map.get("id") {
                return unwrap_move_value(id);
            }
            Some(value)
        }
        other => Some(other),
    }
}

impl ObjectFields {
    /// Build a view from a fields map.
    pub fn new(object_id: ObjectId, version: u64, fields: Map<String, Value>) -> Self {
        Self {
            object_id,
            version,
            type_: None,
            fields,
        }
    }

    /// Build a view from a JSON object; non-objects give an empty view.
    pub fn from_json(object_id: ObjectId, version: u64, fields: Value) -> Self {
        let map = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(object_id, version, map)
    }

    /// Attach the Move type.
    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    /// The raw fields map.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Raw field value, with wrappers removed. `None` for absent or `null`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(unwrap_move_value)
    }

    fn missing(&self, name: &str) -> ChainClientError {
        ChainClientError::Decode(format!("object {} has no field '{}'", self.object_id, name))
    }

    fn invalid(&self, name: &str, why: impl std::fmt::Display) -> ChainClientError {
        ChainClientError::Decode(format!(
            "object {} field '{}': {}",
            self.object_id, name, why
        ))
    }

    /// Optional integer field (string or number encoded).
    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>, ChainClientError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => json_u64(v).map(Some).map_err(|e| self.invalid(name, e)),
        }
    }

    /// Required integer field.
    pub fn u64(&self, name: &str) -> Result<u64, ChainClientError> {
        self.opt_u64(name)?.ok_or_else(|| self.missing(name))
    }

    /// Required small integer field.
    pub fn u8(&self, name: &str) -> Result<u8, ChainClientError> {
        let v = self.u64(name)?;
        u8::try_from(v).map_err(|_| self.invalid(name, format!("{v} exceeds u8")))
    }

    /// Optional boolean field.
    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, ChainClientError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(name, format!("expected bool, got {other}"))),
        }
    }

    /// Required boolean field.
    pub fn bool(&self, name: &str) -> Result<bool, ChainClientError> {
        self.opt_bool(name)?.ok_or_else(|| self.missing(name))
    }

    /// Optional string field.
    pub fn opt_string(&self, name: &str) -> Result<Option<String>, ChainClientError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Array(bytes)) => {
                // vector<u8> rendered as a byte array
                let raw = bytes_from_array(bytes).ok_or_else(|| self.invalid(name, "bad byte array"))?;
                String::from_utf8(raw)
                    .map(Some)
                    .map_err(|e| self.invalid(name, e))
            }
            Some(other) => Err(self.invalid(name, format!("expected string, got {other}"))),
        }
    }

    /// Required string field.
    pub fn string(&self, name: &str) -> Result<String, ChainClientError> {
        self.opt_string(name)?.ok_or_else(|| self.missing(name))
    }

    /// Optional address field, canonicalized.
    pub fn opt_address(&self, name: &str) -> Result<Option<ChainAddress>, ChainClientError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => ChainAddress::parse(s)
                .map(Some)
                .map_err(|e| self.invalid(name, e)),
            Some(other) => Err(self.invalid(name, format!("expected address, got {other}"))),
        }
    }

    /// Required address field.
    pub fn address(&self, name: &str) -> Result<ChainAddress, ChainClientError> {
        self.opt_address(name)?.ok_or_else(|| self.missing(name))
    }

    /// A `vector<u8>` field as lowercase hex without prefix. Accepts byte
    /// arrays and hex strings.
    pub fn opt_bytes_hex(&self, name: &str) -> Result<Option<String>, ChainClientError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Array(bytes)) => bytes_from_array(bytes)
                .map(|b| Some(hex::encode(b)))
                .ok_or_else(|| self.invalid(name, "bad byte array")),
            Some(Value::String(s)) => {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                Ok(Some(digits.to_ascii_lowercase()))
            }
            Some(other) => Err(self.invalid(name, format!("expected bytes, got {other}"))),
        }
    }
}

fn bytes_from_array(values: &[Value]) -> Option<Vec<u8>> {
    values
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}
