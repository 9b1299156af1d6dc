//! RecordStore trait and RocksDB implementation
//!
//! Provides persistent storage for daily and monthly accumulator records.
//! Uses RocksDB with one column family per bucket kind.

use crate::bucket::{Bucket, BucketKind};
use crate::keys::{decode_record_key, encode_meta_key, encode_record_key, record_prefix, META_HEAD};
use crate::records::AccumulatorRecord;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

/// Trait defining the interface for accumulator record storage.
///
/// Records are read and written whole; there are no field-level updates.
pub trait RecordStore {
    /// Get the record of a bucket.
    fn get_record(&self, bucket: &Bucket) -> Result<Option<AccumulatorRecord>>;

    /// Store a record, replacing any previous value for its bucket.
    fn put_record(&self, record: &AccumulatorRecord) -> Result<()>;

    /// Get the height of the last fully processed block.
    fn get_head(&self) -> Result<Option<u64>>;

    /// Set the height of the last fully processed block.
    fn set_head(&self, block: u64) -> Result<()>;

    /// Persist all records of one block and advance the head.
    ///
    /// Implementations must apply the writes atomically: either every record
    /// and the head are stored, or none of them.
    fn commit_block(&self, height: u64, records: &[AccumulatorRecord]) -> Result<()>;

    /// Records of a kind whose bucket lies in `[start, end]`, in bucket order.
    ///
    /// `None` bounds are open.
    fn get_records_in_range(
        &self,
        kind: BucketKind,
        start: Option<&Bucket>,
        end: Option<&Bucket>,
    ) -> Result<Vec<AccumulatorRecord>>;

    /// All records of a kind, in bucket order.
    fn list_records(&self, kind: BucketKind) -> Result<Vec<AccumulatorRecord>> {
        self.get_records_in_range(kind, None, None)
    }
}

/// RocksDB-backed implementation of RecordStore.
///
/// Uses column families to organize different types of data:
/// - daily: daily accumulator records
/// - monthly: monthly accumulator records
/// - meta: metadata (head block)
pub struct RocksRecordStore {
    db: DB,
}

impl RocksRecordStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let column_families = vec![
            ColumnFamilyDescriptor::new(cf_name(BucketKind::Daily), Options::default()),
            ColumnFamilyDescriptor::new(cf_name(BucketKind::Monthly), Options::default()),
            ColumnFamilyDescriptor::new("meta", Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, column_families)
            .context("Failed to open RocksDB database")?;

        Ok(Self { db })
    }

    /// Get a column family handle by name.
    fn get_cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("Column family '{}' not found", name))
    }
}

/// Column family holding records of a bucket kind.
fn cf_name(kind: BucketKind) -> &'static str {
    kind.as_str()
}

impl RecordStore for RocksRecordStore {
    fn get_record(&self, bucket: &Bucket) -> Result<Option<AccumulatorRecord>> {
        let cf = self.get_cf(cf_name(bucket.kind()))?;
        let key = encode_record_key(bucket);
        match self
            .db
            .get_cf(cf, &key)
            .with_context(|| format!("Failed to get {} record", bucket))?
        {
            Some(bytes) => Ok(Some(AccumulatorRecord::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &AccumulatorRecord) -> Result<()> {
        let cf = self.get_cf(cf_name(record.bucket.kind()))?;
        let key = encode_record_key(&record.bucket);
        let value = record.encode()?;
        self.db
            .put_cf(cf, &key, &value)
            .with_context(|| format!("Failed to put {} record", record.bucket))?;
        Ok(())
    }

    fn get_head(&self) -> Result<Option<u64>> {
        let cf = self.get_cf("meta")?;
        let key = encode_meta_key(META_HEAD);
        match self.db.get_cf(cf, &key).context("Failed to get head block")? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    anyhow::anyhow!("Head block must be 8 bytes (u64), got {}", bytes.len())
                })?;
                Ok(Some(u64::from_be_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    fn set_head(&self, block: u64) -> Result<()> {
        let cf = self.get_cf("meta")?;
        let key = encode_meta_key(META_HEAD);
        self.db
            .put_cf(cf, &key, block.to_be_bytes())
            .context("Failed to set head block")?;
        Ok(())
    }

    fn commit_block(&self, height: u64, records: &[AccumulatorRecord]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for record in records {
            let cf = self.get_cf(cf_name(record.bucket.kind()))?;
            batch.put_cf(cf, encode_record_key(&record.bucket), record.encode()?);
        }
        let meta = self.get_cf("meta")?;
        batch.put_cf(meta, encode_meta_key(META_HEAD), height.to_be_bytes());

        self.db
            .write(batch)
            .with_context(|| format!("Failed to commit block {}", height))?;
        Ok(())
    }

    fn get_records_in_range(
        &self,
        kind: BucketKind,
        start: Option<&Bucket>,
        end: Option<&Bucket>,
    ) -> Result<Vec<AccumulatorRecord>> {
        let cf = self.get_cf(cf_name(kind))?;
        let start_key = match start {
            Some(bucket) => encode_record_key(bucket),
            None => vec![record_prefix(kind)],
        };
        let end_key = end.map(encode_record_key);

        let mut records = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key, Direction::Forward));

        for item in iter {
            let (key, value) = item.context("Failed to read iterator")?;

            // Stop once past the end key (inclusive bound)
            if let Some(end_key) = &end_key {
                if key.as_ref() > end_key.as_slice() {
                    break;
                }
            }

            let bucket = decode_record_key(&key).context("Failed to decode record key")?;
            if bucket.kind() != kind {
                continue;
            }
            records.push(AccumulatorRecord::decode(&value)?);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksRecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksRecordStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn day(key: &str) -> Bucket {
        Bucket::parse(BucketKind::Daily, key).unwrap()
    }

    #[test]
    fn test_missing_record_returns_none() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.get_record(&day("2024-01-01")).unwrap().is_none());
        assert!(store.get_head().unwrap().is_none());
    }

    #[test]
    fn test_record_roundtrip() {
        let (store, _temp_dir) = create_test_store();
        let mut record = AccumulatorRecord::new(day("2024-01-01"));
        record.native_tx_count = 3;
        record.native_active_users.insert("A");
        record.last_block_height = 10;
        record.last_seen = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();

        store.put_record(&record).unwrap();
        let retrieved = store.get_record(&day("2024-01-01")).unwrap().unwrap();
        assert_eq!(record, retrieved);

        // Same key string in the other kind is a different record
        let month = Bucket::parse(BucketKind::Monthly, "2024-01").unwrap();
        assert!(store.get_record(&month).unwrap().is_none());
    }

    #[test]
    fn test_commit_block_writes_records_and_head() {
        let (store, _temp_dir) = create_test_store();
        let daily = AccumulatorRecord::new(day("2024-01-31"));
        let monthly = AccumulatorRecord::new(Bucket::parse(BucketKind::Monthly, "2024-01").unwrap());

        store.commit_block(42, &[daily.clone(), monthly.clone()]).unwrap();

        assert_eq!(store.get_head().unwrap(), Some(42));
        assert_eq!(store.get_record(&daily.bucket).unwrap(), Some(daily));
        assert_eq!(store.get_record(&monthly.bucket).unwrap(), Some(monthly));
    }

    #[test]
    fn test_head_roundtrip() {
        let (store, _temp_dir) = create_test_store();
        store.set_head(7).unwrap();
        assert_eq!(store.get_head().unwrap(), Some(7));
        store.set_head(8).unwrap();
        assert_eq!(store.get_head().unwrap(), Some(8));
    }

    #[test]
    fn test_records_in_range() {
        let (store, _temp_dir) = create_test_store();
        for key in ["2024-01-03", "2024-01-01", "2024-01-02", "2024-02-01"] {
            store.put_record(&AccumulatorRecord::new(day(key))).unwrap();
        }

        let all = store.list_records(BucketKind::Daily).unwrap();
        let keys: Vec<String> = all.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["2024-01-01", "2024-01-02", "2024-01-03", "2024-02-01"]);

        let start = day("2024-01-02");
        let end = day("2024-01-03");
        let ranged = store
            .get_records_in_range(BucketKind::Daily, Some(&start), Some(&end))
            .unwrap();
        let keys: Vec<String> = ranged.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["2024-01-02", "2024-01-03"]);

        assert!(store.list_records(BucketKind::Monthly).unwrap().is_empty());
    }
}
