//! Chain configuration
//!
//! Names the chain-specific constants the metrics depend on: the fee pot
//! account, event and call identifiers, and bytecode markers. Defaults
//! describe an Astar-style Substrate chain with a Frontier EVM layer.
//!
//! Configuration files are JSON; every field is optional and falls back
//! to its default.
//!
//! # Example file:
//! ```json
//! {
//!   "fee": { "system_account": "YQnbw3h6couUX48Ghs3qyzhdbyxA3Gu9KQCoi8z2CPBf9N3" },
//!   "transfer_methods": ["transfer", "transferKeepAlive"]
//! }
//! ```

use crate::classify::PayloadMarkers;
use crate::fee::FeeConfig;
use crate::types::MethodId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Fee pot and deposit event
    pub fee: FeeConfig,
    /// Contract-creation bytecode markers
    pub markers: PayloadMarkers,
    /// Event marking a successfully applied extrinsic
    pub success_event: MethodId,
    /// Call routing a transaction into the EVM
    pub evm_dispatch: MethodId,
    /// Event reporting the outcome of an EVM transaction
    pub executed_event: MethodId,
    /// Inherent present in every block, excluded from native fees
    pub housekeeping_call: MethodId,
    /// Section of the balance-transfer calls
    pub transfer_section: String,
    /// Balance-transfer calls whose destination counts as active
    pub transfer_methods: Vec<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            fee: FeeConfig::default(),
            markers: PayloadMarkers::default(),
            success_event: MethodId::new("system", "ExtrinsicSuccess"),
            evm_dispatch: MethodId::new("ethereum", "transact"),
            executed_event: MethodId::new("ethereum", "Executed"),
            housekeeping_call: MethodId::new("timestamp", "set"),
            transfer_section: "balances".to_string(),
            transfer_methods: vec![
                "transfer".to_string(),
                "transferKeepAlive".to_string(),
                "transferAllowDeath".to_string(),
                "transferAll".to_string(),
                "forceTransfer".to_string(),
            ],
        }
    }
}

impl ChainConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: ChainConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        if config.fee.system_account.trim().is_empty() {
            anyhow::bail!("Config {:?}: fee.system_account must not be empty", path);
        }

        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check whether a call belongs to the balance-transfer family.
    pub fn is_transfer(&self, method: &MethodId) -> bool {
        method.section == self.transfer_section
            && self.transfer_methods.iter().any(|m| *m == method.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "fee": {{ "system_account": "Pot" }}, "markers": {{ "creation_opcode": 97 }} }}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = ChainConfig::load(file.path()).unwrap();
        assert_eq!(config.fee.system_account, "Pot");
        assert_eq!(config.fee.deposit_event, MethodId::new("balances", "Deposit"));
        assert_eq!(config.markers.creation_opcode, 0x61);
        assert_eq!(config.markers.creation_secondary, [0x60, 0x40]);
        assert_eq!(config.evm_dispatch, MethodId::new("ethereum", "transact"));
    }

    #[test]
    fn test_load_rejects_empty_account() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "fee": {{ "system_account": "" }} }}"#).unwrap();
        file.flush().unwrap();

        assert!(ChainConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        assert!(ChainConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_transfer_family() {
        let config = ChainConfig::default();
        assert!(config.is_transfer(&MethodId::new("balances", "transferKeepAlive")));
        assert!(!config.is_transfer(&MethodId::new("balances", "setBalance")));
        assert!(!config.is_transfer(&MethodId::new("assets", "transfer")));
    }
}
