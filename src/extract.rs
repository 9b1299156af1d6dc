//! Block metric extraction
//!
//! Builds the per-block [`Snapshot`]: transaction and success counts, fee
//! totals, contract deployments and active addresses, separately for the
//! native and EVM universes.
//!
//! Native contract deployments are not detected; the native deployment and
//! developer sets are always empty.

use crate::classify::is_contract_invocation;
use crate::config::ChainConfig;
use crate::decoder::{EvmCall, EvmCallDecoder};
use crate::error::BlockError;
use crate::snapshot::Snapshot;
use crate::ss58;
use crate::types::{format_evm_address, parse_hex_bytes, Block, Extrinsic};
use crate::wrap::{partition, wrap_transactions, WrappedTransaction};
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Extracts snapshots from blocks.
pub struct Extractor<'a> {
    config: &'a ChainConfig,
    decoder: &'a dyn EvmCallDecoder,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a ChainConfig, decoder: &'a dyn EvmCallDecoder) -> Self {
        Self { config, decoder }
    }

    /// Build the snapshot of one block.
    ///
    /// Fails if any EVM transaction cannot be decoded or a fee deposit is
    /// malformed; no partial snapshot is returned.
    pub fn extract(&self, block: &Block) -> Result<Snapshot, BlockError> {
        let mut snapshot = Snapshot::new(block.height, block.timestamp);

        let wrapped = wrap_transactions(block, &self.config.success_event);
        let (native, evm) = partition(wrapped, &self.config.evm_dispatch);
        let calls = evm
            .iter()
            .map(|tx| self.decoder.decode(tx))
            .collect::<Result<Vec<EvmCall>, BlockError>>()?;

        // Transaction counts
        snapshot.native_tx_count = native.len() as u64;
        snapshot.native_success_count = native.iter().filter(|tx| tx.success).count() as u64;
        snapshot.evm_tx_count = calls.len() as u64;
        snapshot.evm_success_count = calls.iter().filter(|call| call.success).count() as u64;

        // Fees. The housekeeping inherent is in every block and pays nothing meaningful.
        let fee_bearing: Vec<WrappedTransaction<'_>> = native
            .iter()
            .filter(|tx| *tx.method() != self.config.housekeeping_call)
            .cloned()
            .collect();
        snapshot.native_gas_used = self.config.fee.gas_used(&fee_bearing)?;
        snapshot.evm_gas_used = self.config.fee.gas_used(&evm)?;

        // Contract deployments and their developers
        for call in calls
            .iter()
            .filter(|call| self.config.markers.is_contract_creation(&call.data))
        {
            // A creation that never ran has no contract address
            if let (Some(from), Some(to)) = (call.from, call.to) {
                snapshot.evm_contracts_deployed.insert(format_evm_address(&to));
                snapshot
                    .evm_contract_developers
                    .insert(format_evm_address(&from));
            }
        }

        // Native active addresses: signers, then transfer destinations
        for tx in &native {
            if let Some(signer) = tx.extrinsic.signer.as_deref() {
                snapshot.native_active_users.insert(signer.trim());
            }
            if !self.config.is_transfer(tx.method()) {
                continue;
            }
            match transfer_destination(tx.extrinsic) {
                Some(dest) => {
                    if let Err(e) = validate_address(&dest) {
                        warn!(
                            height = block.height,
                            index = tx.index,
                            method = %tx.method(),
                            %dest,
                            error = %e,
                            "malformed transfer destination"
                        );
                    }
                    snapshot.native_active_users.insert(dest);
                }
                None => warn!(
                    height = block.height,
                    index = tx.index,
                    method = %tx.method(),
                    "transfer without destination argument"
                ),
            }
        }

        // EVM active addresses: callers, plus recipients of plain transfers
        for call in &calls {
            if let Some(from) = &call.from {
                snapshot.evm_active_users.insert(format_evm_address(from));
            }
            if !is_contract_invocation(&call.data) {
                if let Some(to) = &call.to {
                    snapshot.evm_active_users.insert(format_evm_address(to));
                }
            }
        }

        debug!(
            height = block.height,
            native_ok = snapshot.native_success_count,
            native = snapshot.native_tx_count,
            evm_ok = snapshot.evm_success_count,
            evm = snapshot.evm_tx_count,
            deployments = snapshot.evm_contracts_deployed.len(),
            "extracted block snapshot"
        );

        Ok(snapshot)
    }
}

/// Destination of a balance transfer: the `dest` argument, or the first
/// argument when no argument is named `dest`.
///
/// `MultiAddress` values (`{"id": ..}`) are unwrapped to the inner account.
pub fn transfer_destination(extrinsic: &Extrinsic) -> Option<String> {
    let value = extrinsic
        .arg("dest")
        .or_else(|| extrinsic.args.first().map(|arg| &arg.value))?;
    address_from_value(value)
}

fn address_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(obj) => {
            let inner = obj
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("id"))
                .or_else(|| obj.iter().next())
                .map(|(_, v)| v)?;
            address_from_value(inner)
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Check that `addr` is an SS58 account or a hex account id (20 or 32 bytes).
pub fn validate_address(addr: &str) -> Result<()> {
    if let Some(hex) = addr.strip_prefix("0x") {
        let bytes = parse_hex_bytes(hex).context("invalid hex account")?;
        if bytes.len() != 20 && bytes.len() != 32 {
            anyhow::bail!("hex account of {} bytes", bytes.len());
        }
        return Ok(());
    }
    ss58::decode_account(addr).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FrontierDecoder;
    use crate::types::{parse_evm_address, CallArg, EventRecord, MethodId, Phase};
    use alloy_primitives::{Address, U256};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;

    const POT: &str = "YQnbw3h6couUX48Ghs3qyzhdbyxA3Gu9KQCoi8z2CPBf9N3";
    const SIGNER_A: &str = "ZAP5o2BjWAo5uoKDE6b6Xkk4Ju7k6bDu24LNjgZbfM3iyiR";
    const DEST_X: &str = "ajYMsCKsEAhEvHpeA4XqsfiA9v1CdzZPrCfS6pEfeGHW9j8";
    const EVM_B: &str = "0x00000000000000000000000000000000000000b1";
    const EVM_C: &str = "0x00000000000000000000000000000000000000c1";

    /// Decoder returning canned calls keyed by extrinsic index.
    struct CannedDecoder(HashMap<usize, EvmCall>);

    impl EvmCallDecoder for CannedDecoder {
        fn decode(&self, tx: &WrappedTransaction<'_>) -> Result<EvmCall, BlockError> {
            self.0
                .get(&tx.index)
                .cloned()
                .ok_or_else(|| BlockError::decode(tx.index, "unknown"))
        }
    }

    fn ext(section: &str, method: &str, signer: Option<&str>, args: Vec<(&str, Value)>) -> Extrinsic {
        Extrinsic {
            method: MethodId::new(section, method),
            signer: signer.map(str::to_string),
            args: args
                .into_iter()
                .map(|(name, value)| CallArg {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }

    fn evt(index: u32, section: &str, method: &str, data: Vec<Value>) -> EventRecord {
        EventRecord {
            phase: Phase::ApplyExtrinsic(index),
            event: MethodId::new(section, method),
            data,
        }
    }

    fn addr(s: &str) -> Address {
        parse_evm_address(s).unwrap()
    }

    /// Transfer A -> X, timestamp.set, and an EVM deployment B -> C.
    fn scenario_block() -> Block {
        Block {
            height: 100,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
            extrinsics: vec![
                ext("timestamp", "set", None, vec![("now", json!(1706745599000u64))]),
                ext(
                    "balances",
                    "transfer",
                    Some(SIGNER_A),
                    vec![("dest", json!({ "id": DEST_X })), ("value", json!("1000"))],
                ),
                ext(
                    "ethereum",
                    "transact",
                    None,
                    vec![("transaction", json!({ "legacy": { "input": "0x60806040" } }))],
                ),
            ],
            events: vec![
                evt(0, "balances", "Deposit", vec![json!(POT), json!(50)]),
                evt(0, "system", "ExtrinsicSuccess", vec![]),
                evt(1, "balances", "Deposit", vec![json!(POT), json!(300)]),
                evt(1, "system", "ExtrinsicSuccess", vec![]),
                evt(2, "balances", "Deposit", vec![json!(POT), json!("0x10")]),
                evt(
                    2,
                    "ethereum",
                    "Executed",
                    vec![json!(EVM_B), json!(EVM_C), json!("0x00"), json!({ "succeed": "Returned" })],
                ),
                evt(2, "system", "ExtrinsicSuccess", vec![]),
            ],
        }
    }

    #[test]
    fn test_scenario_snapshot() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = scenario_block();

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();

        assert_eq!(snapshot.block_height, 100);
        assert_eq!(snapshot.daily.key(), "2024-01-31");
        assert_eq!(snapshot.monthly.key(), "2024-01");

        assert_eq!(snapshot.native_tx_count, 2);
        assert_eq!(snapshot.native_success_count, 2);
        assert_eq!(snapshot.evm_tx_count, 1);
        assert_eq!(snapshot.evm_success_count, 1);
        assert_eq!(snapshot.total_tx_count(), block.extrinsics.len() as u64);

        // timestamp.set deposit (50) is excluded
        assert_eq!(snapshot.native_gas_used, U256::from(300u64));
        assert_eq!(snapshot.evm_gas_used, U256::from(16u64));

        assert_eq!(snapshot.evm_contracts_deployed.as_slice(), &[EVM_C.to_string()]);
        assert_eq!(snapshot.evm_contract_developers.as_slice(), &[EVM_B.to_string()]);
        assert!(snapshot.native_contracts_deployed.is_empty());
        assert!(snapshot.native_contract_developers.is_empty());

        assert_eq!(
            snapshot.native_active_users.iter().collect::<Vec<_>>(),
            vec![SIGNER_A, DEST_X]
        );
        assert_eq!(snapshot.evm_active_users.iter().collect::<Vec<_>>(), vec![EVM_B]);
    }

    #[test]
    fn test_failed_native_counts_but_pays_nothing() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = Block {
            height: 5,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![ext("system", "remark", Some(SIGNER_A), vec![])],
            events: vec![
                evt(0, "balances", "Deposit", vec![json!(POT), json!(999)]),
                evt(0, "system", "ExtrinsicFailed", vec![]),
            ],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(snapshot.native_tx_count, 1);
        assert_eq!(snapshot.native_success_count, 0);
        assert_eq!(snapshot.native_gas_used, U256::ZERO);
        assert_eq!(snapshot.native_active_users.len(), 1);
    }

    #[test]
    fn test_evm_plain_transfer_adds_recipient() {
        let config = ChainConfig::default();
        let mut calls = HashMap::new();
        calls.insert(
            0,
            EvmCall {
                from: Some(addr(EVM_B)),
                to: Some(addr(EVM_C)),
                data: vec![],
                success: false,
            },
        );
        calls.insert(
            1,
            EvmCall {
                from: Some(addr(EVM_C)),
                to: Some(addr(EVM_B)),
                data: vec![0xa9, 0x05, 0x9c, 0xbb],
                success: true,
            },
        );
        let decoder = CannedDecoder(calls);
        let block = Block {
            height: 6,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![
                ext("ethereum", "transact", None, vec![]),
                ext("ethereum", "transact", None, vec![]),
            ],
            events: vec![],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(snapshot.evm_tx_count, 2);
        assert_eq!(snapshot.evm_success_count, 1);
        assert_eq!(snapshot.native_tx_count, 0);
        // B (from), C (plain transfer recipient); second call only adds its caller C again
        assert_eq!(
            snapshot.evm_active_users.iter().collect::<Vec<_>>(),
            vec![EVM_B, EVM_C]
        );
        assert!(snapshot.evm_contracts_deployed.is_empty());
    }

    #[test]
    fn test_decode_failure_aborts_block() {
        let config = ChainConfig::default();
        let decoder = CannedDecoder(HashMap::new());
        let block = Block {
            height: 7,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![
                ext("balances", "transfer", Some(SIGNER_A), vec![("dest", json!(DEST_X))]),
                ext("ethereum", "transact", None, vec![]),
            ],
            events: vec![],
        };

        let err = Extractor::new(&config, &decoder).extract(&block).unwrap_err();
        assert!(matches!(err, BlockError::Decode { index: 1, .. }));
    }

    #[test]
    fn test_malformed_destination_still_added() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = Block {
            height: 8,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![
                ext("balances", "transferKeepAlive", Some(SIGNER_A), vec![("target", json!("not-an-address"))]),
                ext("balances", "transfer", Some(SIGNER_A), vec![("dest", json!(SIGNER_A))]),
            ],
            events: vec![],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(
            snapshot.native_active_users.iter().collect::<Vec<_>>(),
            vec![SIGNER_A, "not-an-address"]
        );
    }

    #[test]
    fn test_non_transfer_balances_call_ignores_args() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = Block {
            height: 9,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![ext("balances", "setBalance", Some(SIGNER_A), vec![("who", json!(DEST_X))])],
            events: vec![],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(snapshot.native_active_users.iter().collect::<Vec<_>>(), vec![SIGNER_A]);
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address(SIGNER_A).is_ok());
        assert!(validate_address(DEST_X).is_ok());
        assert!(validate_address(POT).is_ok());
        assert!(validate_address(EVM_B).is_ok());
        assert!(validate_address(
            "0xd43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d"
        )
        .is_ok());
        assert!(validate_address("0x1234").is_err());
        assert!(validate_address("0xzz").is_err());
        assert!(validate_address("not-an-address").is_err());
        // Right alphabet and length, but nothing behind it
        assert!(validate_address(&"1".repeat(46)).is_err());
        // One character off: checksum no longer matches
        assert!(validate_address("ajYMsCKsEAhEvHpeA4XqsfiA9v1CdzZPrCfS6pEfeGHW9j9").is_err());
    }

    #[test]
    fn test_reverted_evm_call_counts_as_success_and_pays_fee() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = Block {
            height: 10,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![ext(
                "ethereum",
                "transact",
                None,
                vec![("transaction", json!({ "legacy": { "input": "0xa9059cbb" } }))],
            )],
            events: vec![
                evt(0, "balances", "Deposit", vec![json!(POT), json!(16)]),
                evt(
                    0,
                    "ethereum",
                    "Executed",
                    vec![json!(EVM_B), json!(EVM_C), json!("0x00"), json!({ "revert": "Reverted" })],
                ),
                evt(0, "system", "ExtrinsicSuccess", vec![]),
            ],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(snapshot.evm_tx_count, 1);
        assert_eq!(snapshot.evm_success_count, 1);
        assert_eq!(snapshot.evm_gas_used, U256::from(16u64));
    }

    #[test]
    fn test_failed_evm_dispatch_does_not_abort_block() {
        let config = ChainConfig::default();
        let decoder = FrontierDecoder::default();
        let block = Block {
            height: 11,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            extrinsics: vec![ext(
                "ethereum",
                "transact",
                None,
                vec![(
                    "transaction",
                    json!({ "legacy": { "action": { "call": EVM_C }, "input": "0x" } }),
                )],
            )],
            events: vec![evt(0, "system", "ExtrinsicFailed", vec![])],
        };

        let snapshot = Extractor::new(&config, &decoder).extract(&block).unwrap();
        assert_eq!(snapshot.evm_tx_count, 1);
        assert_eq!(snapshot.evm_success_count, 0);
        assert_eq!(snapshot.evm_gas_used, U256::ZERO);
        // No caller is known; the plain-transfer target still counts
        assert_eq!(snapshot.evm_active_users.iter().collect::<Vec<_>>(), vec![EVM_C]);
        assert!(snapshot.evm_contracts_deployed.is_empty());
    }

    #[test]
    fn test_transfer_destination_forms() {
        let plain = ext("balances", "transfer", None, vec![("dest", json!(DEST_X))]);
        let multi = ext("balances", "transfer", None, vec![("dest", json!({ "Id": DEST_X }))]);
        let first = ext("balances", "forceTransfer", None, vec![("source", json!(SIGNER_A))]);
        let none = ext("balances", "transfer", None, vec![]);

        assert_eq!(transfer_destination(&plain).as_deref(), Some(DEST_X));
        assert_eq!(transfer_destination(&multi).as_deref(), Some(DEST_X));
        assert_eq!(transfer_destination(&first).as_deref(), Some(SIGNER_A));
        assert_eq!(transfer_destination(&none), None);
    }
}
