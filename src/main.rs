//! statsctl - chain analytics CLI tool
//!
//! Inspects the daily and monthly records kept in the RocksDB store and
//! dry-runs extraction on single blocks.

use chainstat::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
