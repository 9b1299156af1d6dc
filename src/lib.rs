//! Chainstat - daily and monthly activity metrics for a Substrate chain
//! with a Frontier EVM layer
//!
//! Each block is split into native and EVM transactions, reduced to a
//! per-block snapshot (counts, fees, contract deployments, active users),
//! and merged into persistent daily and monthly accumulator records.

pub mod bucket;
pub mod classify;
pub mod config;
pub mod error;
pub mod keys;
pub mod records;
pub mod snapshot;
pub mod ss58;
pub mod store;
pub mod types;

// Extraction pipeline
pub mod aggregate;
pub mod decoder;
pub mod extract;
pub mod fee;
pub mod handler;
pub mod wrap;

// Ingest and tooling
pub mod cli;
pub mod ingest;
pub mod source;

// Re-export the main types for convenience
pub use bucket::{Bucket, BucketKind};
pub use config::ChainConfig;
pub use error::BlockError;
pub use handler::{BlockHandler, BlockOutcome, ReplayPolicy};
pub use records::{AccumulatorRecord, RecordSummary};
pub use snapshot::{AddressSet, Snapshot};
pub use store::{RecordStore, RocksRecordStore};
