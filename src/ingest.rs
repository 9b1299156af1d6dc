//! Main ingest loop
//!
//! Orchestrates polling the block source and handing each block, in height
//! order, to the block handler.

use crate::decoder::EvmCallDecoder;
use crate::handler::{BlockHandler, BlockOutcome};
use crate::source::BlockSource;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

/// Summary of a processed range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeStats {
    pub committed: u64,
    pub skipped: u64,
}

/// Drives a block handler from a block source.
pub struct Ingester<B, S, D> {
    source: B,
    handler: BlockHandler<S, D>,
}

impl<B: BlockSource, S: RecordStore, D: EvmCallDecoder> Ingester<B, S, D> {
    pub fn new(source: B, handler: BlockHandler<S, D>) -> Self {
        Self { source, handler }
    }

    pub fn handler(&self) -> &BlockHandler<S, D> {
        &self.handler
    }

    /// First height to process: one past the stored head, or `start` when
    /// nothing has been processed yet.
    pub fn next_height(&self, start: u64) -> Result<u64> {
        let head = self
            .handler
            .store()
            .get_head()
            .context("Failed to get local head")?;
        Ok(head.map_or(start, |h| h + 1))
    }

    /// Process blocks `from..=to` sequentially.
    ///
    /// Stops at the first failing block; everything before it stays committed.
    pub async fn process_block_range(&self, from: u64, to: u64) -> Result<RangeStats> {
        let mut stats = RangeStats::default();
        if from > to {
            return Ok(stats); // Nothing to process
        }

        info!("Processing blocks {} to {}", from, to);

        for height in from..=to {
            let block = self
                .source
                .get_block(height)
                .await
                .with_context(|| format!("Failed to fetch block {}", height))?;

            match self
                .handler
                .on_block(&block)
                .with_context(|| format!("Failed to process block {}", height))?
            {
                BlockOutcome::Committed { .. } => stats.committed += 1,
                BlockOutcome::Skipped { .. } => stats.skipped += 1,
            }
        }

        Ok(stats)
    }

    /// Catch up to the source head once.
    pub async fn sync_once(&self, start: u64) -> Result<RangeStats> {
        let next = self.next_height(start)?;
        let latest = self
            .source
            .head_height()
            .await
            .context("Failed to get source head")?;

        if next <= latest {
            info!("New blocks available: next={}, latest={}", next, latest);
            self.process_block_range(next, latest)
                .await
                .context("Failed to process block range")
        } else {
            info!("Up to date. Next: {}, Latest: {}", next, latest);
            Ok(RangeStats::default())
        }
    }

    /// Poll the source forever, sleeping `poll_interval` between rounds.
    pub async fn run(&self, start: u64, poll_interval: Duration) -> Result<()> {
        info!("Starting ingest loop...");

        loop {
            self.sync_once(start).await?;
            tokio::time::sleep(poll_interval).await;
        }
    }
}
