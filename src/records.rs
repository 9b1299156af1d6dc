//! Record types for persisted analytics
//!
//! These structs represent the data stored in the record store.
//! They use postcard for binary serialization, which is compact and deterministic.

use crate::bucket::Bucket;
use crate::snapshot::AddressSet;
use alloy_primitives::U256;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running totals for one daily or monthly bucket.
///
/// Counters are sums over every merged snapshot, address sets are unions.
/// `last_block_height` and `last_seen` describe the most recent merge only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorRecord {
    /// Bucket this record accumulates
    pub bucket: Bucket,

    pub native_tx_count: u64,
    pub native_success_count: u64,
    pub evm_tx_count: u64,
    pub evm_success_count: u64,

    /// Fees paid by native extrinsics (smallest unit)
    pub native_gas_used: U256,
    /// Fees paid by EVM transactions (smallest unit)
    pub evm_gas_used: U256,

    pub native_contracts_deployed: AddressSet,
    pub evm_contracts_deployed: AddressSet,
    pub native_contract_developers: AddressSet,
    pub evm_contract_developers: AddressSet,
    pub native_active_users: AddressSet,
    pub evm_active_users: AddressSet,

    /// Height of the last block merged into this record
    pub last_block_height: u64,
    /// Timestamp of the last block merged into this record
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
}

impl AccumulatorRecord {
    /// Fresh record: all counters zero, all sets empty.
    pub fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            native_tx_count: 0,
            native_success_count: 0,
            evm_tx_count: 0,
            evm_success_count: 0,
            native_gas_used: U256::ZERO,
            evm_gas_used: U256::ZERO,
            native_contracts_deployed: AddressSet::new(),
            evm_contracts_deployed: AddressSet::new(),
            native_contract_developers: AddressSet::new(),
            evm_contract_developers: AddressSet::new(),
            native_active_users: AddressSet::new(),
            evm_active_users: AddressSet::new(),
            last_block_height: 0,
            last_seen: DateTime::<Utc>::default(),
        }
    }

    /// Storage key of this record's bucket.
    pub fn key(&self) -> String {
        self.bucket.key()
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).context("Failed to serialize accumulator record")
    }

    /// Decode a stored record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).context("Failed to deserialize accumulator record")
    }
}

/// Compact view of a record: set sizes instead of full address lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub key: String,
    pub native_tx_count: u64,
    pub native_success_count: u64,
    pub evm_tx_count: u64,
    pub evm_success_count: u64,
    pub native_gas_used: String,
    pub evm_gas_used: String,
    pub evm_contracts_deployed: usize,
    pub evm_contract_developers: usize,
    pub native_active_users: usize,
    pub evm_active_users: usize,
    pub last_block_height: u64,
    pub last_seen: String,
}

impl From<&AccumulatorRecord> for RecordSummary {
    fn from(record: &AccumulatorRecord) -> Self {
        Self {
            key: record.key(),
            native_tx_count: record.native_tx_count,
            native_success_count: record.native_success_count,
            evm_tx_count: record.evm_tx_count,
            evm_success_count: record.evm_success_count,
            native_gas_used: record.native_gas_used.to_string(),
            evm_gas_used: record.evm_gas_used.to_string(),
            evm_contracts_deployed: record.evm_contracts_deployed.len(),
            evm_contract_developers: record.evm_contract_developers.len(),
            native_active_users: record.native_active_users.len(),
            evm_active_users: record.evm_active_users.len(),
            last_block_height: record.last_block_height,
            last_seen: record.last_seen.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_record_is_empty() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let record = AccumulatorRecord::new(Bucket::monthly(ts));
        assert_eq!(record.key(), "2024-03");
        assert_eq!(record.native_tx_count + record.evm_tx_count, 0);
        assert_eq!(record.native_gas_used, U256::ZERO);
        assert!(record.native_active_users.is_empty());
        assert!(record.evm_contracts_deployed.is_empty());
    }

    #[test]
    fn test_encoding_preserves_sets_and_totals() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        let mut record = AccumulatorRecord::new(Bucket::daily(ts));
        record.evm_gas_used = U256::MAX;
        record.native_active_users.insert("b");
        record.native_active_users.insert("a");
        record.last_block_height = 77;
        record.last_seen = ts;

        let decoded = AccumulatorRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.native_active_users.iter().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_summary_counts_sets() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        let mut record = AccumulatorRecord::new(Bucket::daily(ts));
        record.evm_active_users.insert("0x01");
        record.evm_active_users.insert("0x02");
        record.native_gas_used = U256::from(1234u64);

        let summary = RecordSummary::from(&record);
        assert_eq!(summary.key, "2024-03-09");
        assert_eq!(summary.evm_active_users, 2);
        assert_eq!(summary.native_gas_used, "1234");
    }
}
