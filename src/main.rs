//! Wallet ledger CLI
//!
//! Replays a CSV of wallet operations through the ledger and prints the
//! final wallet states to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > wallets.csv
//! cargo run -- --config ledger.toml operations.csv > wallets.csv
//! RUST_LOG=debug cargo run -- operations.csv > wallets.csv
//! ```
//!
//! Logs go to stderr. Top-ups are collected through an in-process recording
//! collaborator; `settle`/`fail` rows in the input play the role of the
//! provider callback.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, input file not readable, output failure)

use std::process;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wallet_ledger::cli;
use wallet_ledger::core::{LedgerEngine, RecordingCollaborator};
use wallet_ledger::io::{replay_file, write_wallets_csv};
use wallet_ledger::LedgerError;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: cli::CliArgs) -> Result<(), LedgerError> {
    let config = args.load_config()?;
    let engine = LedgerEngine::new(config, Arc::new(RecordingCollaborator::new()))?;

    replay_file(&engine, &args.input_file).await?;

    let mut output = std::io::stdout();
    write_wallets_csv(&engine.list_wallets(), &mut output)
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = cli::parse_args();

    if let Err(e) = run(args).await {
        error!(error = %e, "wallet-ledger failed");
        process::exit(1);
    }
}
