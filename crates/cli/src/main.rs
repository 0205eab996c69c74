//! hashledger CLI entry point.

use clap::{CommandFactory, Parser};
use colored::Colorize;
use std::path::PathBuf;
use tracing::Level;

mod commands;
mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "hashledger")]
#[command(about = "An append-only proof-of-work ledger", long_about = None)]
struct Cli {
    /// Directory holding the ledger store
    #[arg(short, long, default_value = "tmp/blocks", global = true)]
    data_dir: PathBuf,

    /// Chunks searched in parallel when sealing a block
    #[arg(short, long, default_value = "1", global = true)]
    workers: usize,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    let cli = Cli::parse();

    let Some(cmd) = cli.command else {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Error: {}", e);
        }
        return;
    };

    init_tracing(cli.verbose);

    let config = CliConfig {
        data_dir: cli.data_dir,
        workers: cli.workers,
    };

    if let Err(e) = commands::run(cmd, &config) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
