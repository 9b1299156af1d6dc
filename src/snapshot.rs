//! Per-block metrics snapshot
//!
//! A `Snapshot` is built from exactly one block and then folded into the
//! daily and monthly accumulator records.

use crate::bucket::Bucket;
use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

/// Deduplicated set of addresses that remembers insertion order.
///
/// Elements are only ever appended; nothing is removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct AddressSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an address, returning true if it was not present yet.
    pub fn insert(&mut self, addr: impl Into<String>) -> bool {
        let addr = addr.into();
        if self.seen.contains(&addr) {
            return false;
        }
        self.seen.insert(addr.clone());
        self.order.push(addr);
        true
    }

    /// Append every address of `other` not yet present, in `other`'s order.
    ///
    /// Returns the number of newly added addresses.
    pub fn union(&mut self, other: &AddressSet) -> usize {
        other.iter().filter(|addr| self.insert(*addr)).count()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.seen.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Addresses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }
}

impl PartialEq for AddressSet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for AddressSet {}

impl<S: Into<String>> FromIterator<S> for AddressSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AddressSet::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}

// Stored as a plain list; duplicates in stored data collapse on load.
impl Serialize for AddressSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.order.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AddressSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<String>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

/// Metrics extracted from a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub block_height: u64,
    pub timestamp: DateTime<Utc>,
    pub daily: Bucket,
    pub monthly: Bucket,

    pub native_tx_count: u64,
    pub native_success_count: u64,
    pub evm_tx_count: u64,
    pub evm_success_count: u64,

    pub native_gas_used: U256,
    pub evm_gas_used: U256,

    /// Always empty: native contract deployments are not detected
    pub native_contracts_deployed: AddressSet,
    pub evm_contracts_deployed: AddressSet,
    /// Always empty, see `native_contracts_deployed`
    pub native_contract_developers: AddressSet,
    pub evm_contract_developers: AddressSet,
    pub native_active_users: AddressSet,
    pub evm_active_users: AddressSet,
}

impl Snapshot {
    /// Empty snapshot for a block at `height` / `timestamp`.
    pub fn new(block_height: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            block_height,
            timestamp,
            daily: Bucket::daily(timestamp),
            monthly: Bucket::monthly(timestamp),
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
        }
    }

    /// Total extrinsics accounted for across both universes.
    pub fn total_tx_count(&self) -> u64 {
        self.native_tx_count + self.evm_tx_count
    }
}
