//! Block ingest binary
//!
//! Follows finalized blocks from a block file or a Substrate API Sidecar
//! instance and folds each one into the daily and monthly records.

use anyhow::{Context, Result};
use chainstat::config::ChainConfig;
use chainstat::decoder::FrontierDecoder;
use chainstat::handler::{BlockHandler, ReplayPolicy};
use chainstat::ingest::Ingester;
use chainstat::source::{BlockSource, FileBlockSource, SidecarClient};
use chainstat::store::RocksRecordStore;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Chain analytics ingester
#[derive(Parser)]
#[command(name = "ingest")]
#[command(about = "Aggregate block activity into daily and monthly records")]
struct Args {
    /// Sidecar endpoint URL (e.g., http://127.0.0.1:8080)
    #[arg(short, long, default_value = "http://127.0.0.1:8080", conflicts_with = "blocks")]
    sidecar_url: String,

    /// Read blocks from a newline-delimited JSON file instead of sidecar
    #[arg(short, long)]
    blocks: Option<PathBuf>,

    /// Path to RocksDB database directory
    #[arg(short, long, default_value = "./stats_db")]
    db_path: PathBuf,

    /// Chain config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First block height when the database is empty
    /// (defaults to the first block in the file, or 0 for sidecar)
    #[arg(long)]
    start: Option<u64>,

    /// Skip blocks at or below the stored head instead of merging them again
    #[arg(long)]
    skip_processed: bool,

    /// Seconds between polls of the block source
    #[arg(long, default_value_t = 12)]
    poll_secs: u64,

    /// Catch up to the current head once and exit
    #[arg(long)]
    once: bool,
}

async fn drive<B: BlockSource>(
    ingester: Ingester<B, RocksRecordStore, FrontierDecoder>,
    start: u64,
    args: &Args,
) -> Result<()> {
    info!("Start height: {}", start);
    if args.once {
        let stats = ingester.sync_once(start).await?;
        info!("Committed {} blocks, skipped {}", stats.committed, stats.skipped);
        return Ok(());
    }

    // Handle Ctrl+C gracefully
    tokio::select! {
        result = ingester.run(start, Duration::from_secs(args.poll_secs)) => {
            result.context("Ingest error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = ChainConfig::load_or_default(args.config.as_deref())?;
    let replay = if args.skip_processed {
        ReplayPolicy::SkipProcessed
    } else {
        ReplayPolicy::Trust
    };

    info!("Starting chain analytics ingester");
    info!("Database: {:?}", args.db_path);
    info!("Replay policy: {:?}", replay);

    let store = RocksRecordStore::open(&args.db_path)
        .with_context(|| format!("Failed to open database at {:?}", args.db_path))?;
    let decoder = FrontierDecoder::new(config.executed_event.clone());
    let timestamp_call = config.housekeeping_call.clone();
    let handler = BlockHandler::new(store, decoder, config).with_replay_policy(replay);

    match &args.blocks {
        Some(path) => {
            info!("Block file: {:?}", path);
            let source = FileBlockSource::open(path)?;
            let start = args.start.or(source.first_height()).unwrap_or(0);
            drive(Ingester::new(source, handler), start, &args).await?;
        }
        None => {
            info!("Sidecar URL: {}", args.sidecar_url);
            let source = SidecarClient::new(args.sidecar_url.clone(), timestamp_call);
            drive(Ingester::new(source, handler), args.start.unwrap_or(0), &args).await?;
        }
    }

    info!("Ingester stopped");
    Ok(())
}
