//! Persistent ledger for hashledger.
//!
//! This crate keeps the chain of sealed blocks in an embedded key-value
//! store:
//! - Bootstrap of a genesis block on first open, recovery of the tip after
//! - Transactional append of newly sealed blocks
//! - Reverse iteration from the tip back to genesis
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │                 (CLI add / print commands)               │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │  ┌─────────────┐  ┌───────────────┐  ┌───────────────┐  │
//! │  │ Ledger      │  │ ChainIterator │  │ Storage (DB)  │  │
//! │  │  - Genesis  │  │  - Tip first  │  │  - sled       │  │
//! │  │  - Append   │  │  - Read only  │  │  - txns       │  │
//! │  │  - Tip      │  │               │  │               │  │
//! │  └─────────────┘  └───────────────┘  └───────────────┘  │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                    sled Database                         │
//! │              (Embedded Key-Value Store)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hashledger_core::PayloadDigest;
//! use hashledger_storage::Ledger;
//!
//! let mut ledger = Ledger::open("./tmp/blocks").unwrap();
//! ledger.append(PayloadDigest::from_text("hello")).unwrap();
//!
//! for block in ledger.iter() {
//!     let block = block.unwrap();
//!     println!("{} valid={}", block.hash(), block.validate());
//! }
//!
//! ledger.close().unwrap();
//! ```

pub mod db;
pub mod iterator;
pub mod ledger;

// Re-export commonly used types
pub use db::{Result, Storage, StorageError};
pub use iterator::ChainIterator;
pub use ledger::{Ledger, LedgerConfig, DEFAULT_DIFFICULTY, TIP_KEY};
