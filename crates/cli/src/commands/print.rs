//! Print chain command.

use anyhow::{Context, Result};
use colored::Colorize;
use hashledger_core::Block;
use hashledger_storage::Ledger;

pub fn run(ledger: &Ledger) -> Result<()> {
    let mut walked = 0usize;

    for block in ledger.iter() {
        let block = block.with_context(|| format!("Chain walk failed after {} blocks", walked))?;
        print_block(&block);
        walked += 1;
    }

    println!(
        "{}",
        format!("Reached genesis after {} blocks", walked).bright_black()
    );
    Ok(())
}

fn print_block(block: &Block) {
    let prev_hash = hex::encode(block.prev_hash());
    let pow = if block.validate() {
        "true".green()
    } else {
        "false".red().bold()
    };

    println!("Hash:       {}", block.hash().to_hex().bright_yellow());
    println!("MerkleRoot: {}", block.payload_digest().to_text_lossy());
    println!("Prev hash:  {}", prev_hash.bright_black());
    println!("Nonce:      {}", block.nonce().to_string().bright_cyan());
    println!("Timestamp:  {}", block.timestamp().to_string().bright_black());
    println!("PoW:        {}", pow);
    println!();
}
