//! # Move Calls
//!
//! The typed call a transaction carries and its wire encoding. The
//! encoding is bincode over [`TransactionData`], then base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use shared_types::{ChainAddress, ObjectId};

use super::errors::BuildError;

/// Wire format version.
pub const TX_DATA_VERSION: u8 = 1;

/// A pure (by-value) argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PureArg {
    /// `u8`
    U8(u8),
    /// `u64`
    U64(u64),
    /// `bool`
    Bool(bool),
    /// `address`
    Address(ChainAddress),
    /// `0x1::string::String`
    String(String),
    /// `vector<u8>`
    Bytes(Vec<u8>),
    /// `vector<String>`
    StringVec(Vec<String>),
    /// `vector<u64>`
    U64Vec(Vec<u64>),
}

impl PureArg {
    fn encode(&self) -> Result<Vec<u8>, BuildError> {
        let result = match self {
            PureArg::U8(v) => bincode::serialize(v),
            PureArg::U64(v) => bincode::serialize(v),
            PureArg::Bool(v) => bincode::serialize(v),
            PureArg::Address(a) => bincode::serialize(&a.to_bytes()),
            PureArg::String(s) => bincode::serialize(s),
            PureArg::Bytes(b) => bincode::serialize(b),
            PureArg::StringVec(v) => bincode::serialize(v),
            PureArg::U64Vec(v) => bincode::serialize(v),
        };
        result.map_err(|e| BuildError::Serialization(e.to_string()))
    }
}

/// One argument of a Move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallArg {
    /// A shared object, by id.
    Shared {
        /// Object id
        id: ObjectId,
        /// Whether the call mutates it
        mutable: bool,
    },
    /// An owned object, by id.
    Owned(ObjectId),
    /// A by-value argument.
    Pure(PureArg),
}

/// A Move function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    /// Package id
    pub package: ObjectId,
    /// Module name
    pub module: String,
    /// Function name
    pub function: String,
    /// Type arguments
    pub type_arguments: Vec<String>,
    /// Arguments in declaration order
    pub arguments: Vec<CallArg>,
}

/// Wire form of an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireArg {
    /// Shared object id and mutability.
    Shared([u8; 32], bool),
    /// Owned object id.
    Owned([u8; 32]),
    /// Encoded pure value.
    Pure(Vec<u8>),
}

/// Unsigned transaction as it is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    /// Format version.
    pub version: u8,
    /// Sender address bytes.
    pub sender: [u8; 32],
    /// Gas budget in base units.
    pub gas_budget: u64,
    /// Package id bytes.
    pub package: [u8; 32],
    /// Module name.
    pub module: String,
    /// Function name.
    pub function: String,
    /// Type arguments.
    pub type_arguments: Vec<String>,
    /// Encoded arguments.
    pub arguments: Vec<WireArg>,
}

impl TransactionData {
    /// Encode a call for a sender.
    pub fn from_call(
        sender: &ChainAddress,
        gas_budget: u64,
        call: &MoveCall,
    ) -> Result<Self, BuildError> {
        let arguments = call
            .arguments
            .iter()
            .map(|arg| {
                Ok(match arg {
                    CallArg::Shared { id, mutable } => WireArg::Shared(id.to_bytes(), *mutable),
                    CallArg::Owned(id) => WireArg::Owned(id.to_bytes()),
                    CallArg::Pure(p) => WireArg::Pure(p.encode()?),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(Self {
            version: TX_DATA_VERSION,
            sender: sender.to_bytes(),
            gas_budget,
            package: call.package.to_bytes(),
            module: call.module.clone(),
            function: call.function.clone(),
            type_arguments: call.type_arguments.clone(),
            arguments,
        })
    }

    /// bincode then base64.
    pub fn to_base64(&self) -> Result<String, BuildError> {
        let bytes = bincode::serialize(self).map_err(|e| BuildError::Serialization(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }

    /// Inverse of [`to_base64`](Self::to_base64).
    pub fn from_base64(encoded: &str) -> Result<Self, BuildError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| BuildError::Serialization(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| BuildError::Serialization(e.to_string()))
    }
}

/// Builder output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    /// Base64 transaction bytes for the wallet to sign.
    pub tx_bytes: String,
    /// The call that was encoded.
    pub call: MoveCall,
    /// Sender, canonicalized.
    pub sender: ChainAddress,
    /// Gas budget.
    pub gas_budget: u64,
    /// The intent after canonicalization.
    pub inputs: serde_json::Value,
}
