//! Append block command.

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;
use colored::Colorize;
use hashledger_core::PayloadDigest;
use hashledger_storage::Ledger;

#[derive(Args)]
pub struct AddArgs {
    /// Block data
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    pub block: String,
}

pub fn run(ledger: &mut Ledger, args: AddArgs) -> Result<()> {
    println!("{}", "Sealing block...".bold().cyan());

    let block = ledger
        .append(PayloadDigest::from_text(&args.block))
        .context("Failed to add block")?;

    println!("{}  Added block", "✓".green().bold());
    println!("    Hash:  {}", block.hash().to_hex().bright_yellow());
    println!("    Nonce: {}", block.nonce().to_string().bright_cyan());

    Ok(())
}
