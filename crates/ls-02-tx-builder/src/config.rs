//! # Transaction Builder Configuration

use serde::{Deserialize, Serialize};
use shared_types::ObjectId;

/// Default gas budget (0.05 coin).
pub const DEFAULT_GAS_BUDGET: u64 = 50_000_000;

/// Contract coordinates and gas settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBuilderConfig {
    /// Published package id.
    pub package_id: ObjectId,
    /// Shared DAO object id.
    pub dao_object_id: ObjectId,
    /// Shared clock object id.
    pub clock_object_id: ObjectId,
    /// DAO module name.
    pub dao_module: String,
    /// Escrow module name.
    pub escrow_module: String,
    /// Gas budget for every transaction.
    pub gas_budget: u64,
}

impl TxBuilderConfig {
    /// Configuration with default module names, clock and gas budget.
    pub fn new(package_id: ObjectId, dao_object_id: ObjectId) -> Self {
        Self {
            package_id,
            dao_object_id,
            clock_object_id: ObjectId::from_bytes({
                let mut b = [0u8; 32];
                b[31] = 6;
                b
            }),
            dao_module: "dao".to_string(),
            escrow_module: "escrow".to_string(),
            gas_budget: DEFAULT_GAS_BUDGET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clock_is_0x6() {
        let config = TxBuilderConfig::new(ObjectId::zero(), ObjectId::zero());
        assert_eq!(config.clock_object_id, ObjectId::parse("0x6").unwrap());
        assert_eq!(config.gas_budget, 50_000_000);
    }
}
