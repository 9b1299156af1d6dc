//! CLI implementation for statsctl
//!
//! Provides a command-line interface for inspecting the accumulated
//! daily/monthly records and for dry-running extraction on a block.
//! All commands output pretty JSON.

use crate::bucket::{Bucket, BucketKind};
use crate::config::ChainConfig;
use crate::decoder::FrontierDecoder;
use crate::extract::Extractor;
use crate::records::{AccumulatorRecord, RecordSummary};
use crate::source::{BlockSource, FileBlockSource};
use crate::store::{RecordStore, RocksRecordStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Chain analytics CLI tool
#[derive(Parser)]
#[command(name = "statsctl")]
#[command(about = "Inspect daily and monthly chain analytics")]
pub struct Cli {
    /// Path to the RocksDB database directory
    #[arg(short, long, default_value = "./stats_db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get the last processed block height
    GetHead,
    /// Set the last processed block height
    SetHead {
        /// Block height
        block: u64,
    },
    /// Get one record by key (YYYY-MM-DD for daily, YYYY-MM for monthly)
    Get {
        /// Bucket key
        key: String,
        /// Print set sizes instead of full address lists
        #[arg(short, long)]
        summary: bool,
    },
    /// List records of a kind, optionally within [from, to]
    List {
        /// Bucket kind: daily or monthly
        kind: BucketKind,
        /// First bucket key (inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Last bucket key (inclusive)
        #[arg(long)]
        to: Option<String>,
        /// Print full records instead of summaries
        #[arg(long)]
        full: bool,
    },
    /// Extract the snapshot of one block from a block file without storing it
    Extract {
        /// Newline-delimited JSON block file
        blocks: PathBuf,
        /// Block height
        height: u64,
        /// Chain config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn open_store(path: &Path) -> Result<RocksRecordStore> {
    RocksRecordStore::open(path).with_context(|| format!("Failed to open database at {:?}", path))
}

fn record_json(record: &AccumulatorRecord, summary: bool) -> Result<Value> {
    if summary {
        Ok(serde_json::to_value(RecordSummary::from(record))?)
    } else {
        Ok(serde_json::to_value(record)?)
    }
}

fn parse_bound(kind: BucketKind, key: Option<&str>) -> Result<Option<Bucket>> {
    key.map(|k| Bucket::parse(kind, k)).transpose()
}

/// Execute a parsed command and return its JSON output.
pub async fn execute(cli: Cli) -> Result<Value> {
    let result = match cli.command {
        Commands::GetHead => {
            let store = open_store(&cli.db_path)?;
            json!({ "head_block": store.get_head()? })
        }
        Commands::SetHead { block } => {
            let store = open_store(&cli.db_path)?;
            store.set_head(block)?;
            json!({ "status": "ok", "head_block": block })
        }
        Commands::Get { key, summary } => {
            let store = open_store(&cli.db_path)?;
            let bucket = Bucket::parse_any(&key)?;
            match store.get_record(&bucket)? {
                Some(record) => json!({
                    "kind": bucket.kind(),
                    "key": key,
                    "record": record_json(&record, summary)?,
                }),
                None => json!({
                    "kind": bucket.kind(),
                    "key": key,
                    "record": null
                }),
            }
        }
        Commands::List {
            kind,
            from,
            to,
            full,
        } => {
            let store = open_store(&cli.db_path)?;
            let start = parse_bound(kind, from.as_deref())?;
            let end = parse_bound(kind, to.as_deref())?;
            let records = store.get_records_in_range(kind, start.as_ref(), end.as_ref())?;
            let items = records
                .iter()
                .map(|r| record_json(r, !full))
                .collect::<Result<Vec<_>>>()?;
            json!({ "kind": kind, "count": items.len(), "records": items })
        }
        Commands::Extract {
            blocks,
            height,
            config,
        } => {
            let config = ChainConfig::load_or_default(config.as_deref())?;
            let source = FileBlockSource::open(&blocks)?;
            let block = source.get_block(height).await?;
            let decoder = FrontierDecoder::new(config.executed_event.clone());
            let snapshot = Extractor::new(&config, &decoder)
                .extract(&block)
                .with_context(|| format!("Failed to extract block {}", height))?;
            serde_json::to_value(&snapshot)?
        }
    };

    Ok(result)
}

/// Run the CLI command and print JSON output.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let result = execute(cli).await?;

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
