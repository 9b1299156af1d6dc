//! Key encoding and decoding utilities
//!
//! All keys use a single-byte prefix followed by the bucket key in ASCII.
//! `YYYY-MM-DD` / `YYYY-MM` sort chronologically, so RocksDB iteration
//! yields records in bucket order.

use crate::bucket::{Bucket, BucketKind};
use anyhow::{Context, Result};

/// Meta id of the last fully processed block height.
pub const META_HEAD: u8 = 0x01;

/// Prefix byte for records of a bucket kind.
pub fn record_prefix(kind: BucketKind) -> u8 {
    match kind {
        BucketKind::Daily => b'D',
        BucketKind::Monthly => b'M',
    }
}

/// Encode a record key.
///
/// Format: byte 'D' (0x44) + "YYYY-MM-DD" (10 bytes), or
///         byte 'M' (0x4D) + "YYYY-MM" (7 bytes)
pub fn encode_record_key(bucket: &Bucket) -> Vec<u8> {
    let key = bucket.key();
    let mut out = Vec::with_capacity(1 + key.len());
    out.push(record_prefix(bucket.kind()));
    out.extend_from_slice(key.as_bytes());
    out
}

/// Decode a record key back into its bucket.
pub fn decode_record_key(bytes: &[u8]) -> Result<Bucket> {
    let (prefix, rest) = bytes.split_first().context("Empty record key")?;
    let kind = match prefix {
        b'D' => BucketKind::Daily,
        b'M' => BucketKind::Monthly,
        other => anyhow::bail!("Unknown record key prefix 0x{:02x}", other),
    };
    let key = std::str::from_utf8(rest).context("Record key is not UTF-8")?;
    Bucket::parse(kind, key)
}

/// Encode a meta key.
///
/// Format: byte 'H' (0x48) + meta_id (1 byte)
/// Total length: 2 bytes
///
/// Meta IDs:
/// - 0x01: head block
pub fn encode_meta_key(meta_id: u8) -> Vec<u8> {
    vec![b'H', meta_id]
}
