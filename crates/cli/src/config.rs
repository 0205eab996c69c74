//! Settings resolved from the command line.

use hashledger_storage::LedgerConfig;
use std::path::PathBuf;

/// Everything a command needs to know about its environment.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory holding the ledger store.
    pub data_dir: PathBuf,
    /// Parallel chunks per nonce search window.
    pub workers: usize,
}

impl CliConfig {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            workers: self.workers.max(1),
            ..LedgerConfig::default()
        }
    }
}
