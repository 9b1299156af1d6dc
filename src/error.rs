//! Block processing errors

use thiserror::Error;

/// Failure that aborts processing of a whole block.
///
/// Nothing from the block is persisted when one of these is returned.
#[derive(Error, Debug)]
pub enum BlockError {
    /// An extrinsic could not be decoded into the values metrics are built from.
    #[error("failed to decode extrinsic #{index}: {reason}")]
    Decode { index: usize, reason: String },
    /// A transaction counter of a record would exceed `u64::MAX`.
    #[error("counter `{field}` of record {key} overflowed")]
    Overflow { key: String, field: &'static str },
    /// The record store could not be read or written.
    #[error("record store unavailable: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl BlockError {
    pub fn decode(index: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            index,
            reason: reason.into(),
        }
    }
}
