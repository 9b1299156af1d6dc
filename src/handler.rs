//! Block handler
//!
//! Entry point invoked once per block: extract the snapshot, merge it into
//! the daily and monthly records, and commit both records together with the
//! new head height.

use crate::aggregate::Aggregator;
use crate::config::ChainConfig;
use crate::decoder::EvmCallDecoder;
use crate::error::BlockError;
use crate::extract::Extractor;
use crate::records::AccumulatorRecord;
use crate::store::RecordStore;
use crate::types::Block;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What to do with a block at or below the stored head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayPolicy {
    /// Merge every block as delivered; the caller guarantees exactly-once order.
    #[default]
    Trust,
    /// Skip blocks whose height is not above the stored head.
    SkipProcessed,
}

/// Result of handling one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Records were merged and committed.
    Committed {
        daily: AccumulatorRecord,
        monthly: AccumulatorRecord,
    },
    /// Block was already processed and left untouched.
    Skipped { head: u64 },
}

pub struct BlockHandler<S, D> {
    store: S,
    decoder: D,
    config: ChainConfig,
    replay: ReplayPolicy,
}

impl<S: RecordStore, D: EvmCallDecoder> BlockHandler<S, D> {
    pub fn new(store: S, decoder: D, config: ChainConfig) -> Self {
        Self {
            store,
            decoder,
            config,
            replay: ReplayPolicy::default(),
        }
    }

    pub fn with_replay_policy(mut self, replay: ReplayPolicy) -> Self {
        self.replay = replay;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one block.
    ///
    /// Either both records and the head are persisted, or nothing is.
    pub fn on_block(&self, block: &Block) -> Result<BlockOutcome, BlockError> {
        if self.replay == ReplayPolicy::SkipProcessed {
            if let Some(head) = self.store.get_head()? {
                if block.height <= head {
                    debug!(height = block.height, head, "skipping processed block");
                    return Ok(BlockOutcome::Skipped { head });
                }
            }
        }

        let snapshot = Extractor::new(&self.config, &self.decoder).extract(block)?;

        let (daily, monthly) = Aggregator::new(&self.store).merge_all(&snapshot)?;
        self.store
            .commit_block(block.height, &[daily.clone(), monthly.clone()])?;

        info!(
            height = block.height,
            timestamp = %block.timestamp.to_rfc3339(),
            txs = snapshot.total_tx_count(),
            native = snapshot.native_tx_count,
            evm = snapshot.evm_tx_count,
            daily = %daily.key(),
            monthly = %monthly.key(),
            "committed block"
        );

        Ok(BlockOutcome::Committed { daily, monthly })
    }
}
