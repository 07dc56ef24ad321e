//! Validation configuration

use serde::{Deserialize, Serialize};
use crate::error::SerializationError;
use crate::identity::SecurityLevel;

/// Tunables shared by all validation stages
///
/// Every node validating the same chain must run with the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Maximum serialized size of a state transition in bytes
    pub max_state_transition_size: usize,
    /// Half-width of the timestamp acceptance window around block time
    pub block_time_window_ms: u64,
    /// Credits minted per duff of asset-lock value
    pub credits_per_duff: u64,
    pub max_identity_public_keys: usize,
    pub max_document_transitions: usize,
    pub min_asset_lock_value_duffs: u64,
    /// Key security level required when a document type declares none
    pub default_security_level: SecurityLevel,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_state_transition_size: 16 * 1024,
            block_time_window_ms: 5 * 60 * 1000,
            credits_per_duff: 1000,
            max_identity_public_keys: 10,
            max_document_transitions: 10,
            min_asset_lock_value_duffs: 1000,
            default_security_level: SecurityLevel::High,
        }
    }
}

impl ValidationConfig {
    /// Parse a configuration, filling unspecified fields with defaults
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        serde_json::from_str(json).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("Invalid validation config: {}", e),
        })
    }

    /// Convert an asset-lock value in duffs to credits
    pub fn duffs_to_credits(&self, duffs: u64) -> Option<u64> {
        duffs.checked_mul(self.credits_per_duff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ValidationConfig::from_json(r#"{"maxStateTransitionSize": 1024}"#).unwrap();
        assert_eq!(config.max_state_transition_size, 1024);
        assert_eq!(config.block_time_window_ms, 300_000);
        assert_eq!(config.default_security_level, SecurityLevel::High);
    }

    #[test]
    fn test_duffs_conversion() {
        let config = ValidationConfig::default();
        assert_eq!(config.duffs_to_credits(42), Some(42_000));
        assert_eq!(config.duffs_to_credits(u64::MAX), None);
    }
}
