//! CLI commands module.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use hashledger_storage::Ledger;

mod add;
mod print;

#[derive(Subcommand)]
pub enum Commands {
    /// Append a block to the chain
    Add(add::AddArgs),
    /// Print the blocks in the chain, newest first
    Print,
}

/// Open the ledger, run one command against it, and close it.
pub fn run(cmd: Commands, config: &CliConfig) -> Result<()> {
    let mut ledger = Ledger::open_with_config(&config.data_dir, config.ledger_config())
        .with_context(|| format!("Failed to open ledger at {}", config.data_dir.display()))?;

    let result = match cmd {
        Commands::Add(args) => add::run(&mut ledger, args),
        Commands::Print => print::run(&ledger),
    };

    let closed = ledger.close().context("Failed to close ledger");
    result?;
    closed
}
