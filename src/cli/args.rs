use crate::config::LedgerConfig;
use crate::types::LedgerError;
use clap::Parser;
use std::path::PathBuf;

/// Replay wallet operations through the ledger and print final wallet states
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Replay wallet operations through the ledger", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation rows
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Optional TOML configuration file
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "Ledger configuration (TOML); defaults are used when omitted"
    )]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Load the configuration named by `--config`, or the defaults
    pub fn load_config(&self) -> Result<LedgerConfig, LedgerError> {
        match &self.config {
            Some(path) => LedgerConfig::from_toml_file(path),
            None => Ok(LedgerConfig::default()),
        }
    }
}
