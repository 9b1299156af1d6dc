//! Time-bucketed aggregation
//!
//! Folds a block [`Snapshot`] into the accumulator record of a bucket.
//! Daily and monthly records go through the same routine.

use crate::bucket::Bucket;
use crate::error::BlockError;
use crate::records::AccumulatorRecord;
use crate::snapshot::Snapshot;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use tracing::debug;

impl AccumulatorRecord {
    /// Add a snapshot's counters and union its address sets into this record.
    ///
    /// Set elements keep their order; new addresses are appended in the
    /// snapshot's order. Block height and timestamp are overwritten.
    ///
    /// Fails without modifying the record if a transaction counter would
    /// overflow.
    pub fn merge(&mut self, snapshot: &Snapshot) -> Result<(), BlockError> {
        let add = |field: &'static str, current: u64, delta: u64| {
            current.checked_add(delta).ok_or_else(|| BlockError::Overflow {
                key: self.key(),
                field,
            })
        };
        let native_tx_count = add("native_tx_count", self.native_tx_count, snapshot.native_tx_count)?;
        let native_success_count = add(
            "native_success_count",
            self.native_success_count,
            snapshot.native_success_count,
        )?;
        let evm_tx_count = add("evm_tx_count", self.evm_tx_count, snapshot.evm_tx_count)?;
        let evm_success_count = add(
            "evm_success_count",
            self.evm_success_count,
            snapshot.evm_success_count,
        )?;

        self.native_tx_count = native_tx_count;
        self.native_success_count = native_success_count;
        self.evm_tx_count = evm_tx_count;
        self.evm_success_count = evm_success_count;

        self.native_gas_used = self.native_gas_used.saturating_add(snapshot.native_gas_used);
        self.evm_gas_used = self.evm_gas_used.saturating_add(snapshot.evm_gas_used);

        self.native_contracts_deployed
            .union(&snapshot.native_contracts_deployed);
        self.evm_contracts_deployed
            .union(&snapshot.evm_contracts_deployed);
        self.native_contract_developers
            .union(&snapshot.native_contract_developers);
        self.evm_contract_developers
            .union(&snapshot.evm_contract_developers);
        self.native_active_users.union(&snapshot.native_active_users);
        self.evm_active_users.union(&snapshot.evm_active_users);

        self.last_block_height = snapshot.block_height;
        self.last_seen = snapshot.timestamp;
        Ok(())
    }
}

/// Loads, merges and returns bucket records; persisting is left to the caller.
pub struct Aggregator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Aggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Merge `snapshot` into the stored record of `bucket`.
    ///
    /// A bucket without a stored record starts from an empty record.
    pub fn merge(&self, bucket: Bucket, snapshot: &Snapshot) -> Result<AccumulatorRecord, BlockError> {
        let mut record = self
            .store
            .get_record(&bucket)
            .with_context(|| format!("Failed to load {} record", bucket))?
            .unwrap_or_else(|| {
                debug!("Creating {} record", bucket);
                AccumulatorRecord::new(bucket)
            });

        record.merge(snapshot)?;
        Ok(record)
    }

    /// Merge `snapshot` into its daily and monthly records.
    ///
    /// Returns `(daily, monthly)`; neither is persisted.
    pub fn merge_all(
        &self,
        snapshot: &Snapshot,
    ) -> Result<(AccumulatorRecord, AccumulatorRecord), BlockError> {
        let daily = self.merge(snapshot.daily, snapshot)?;
        let monthly = self.merge(snapshot.monthly, snapshot)?;
        Ok((daily, monthly))
    }
}
