//! Reverse chain iterator.

use crate::db::{Result, StorageError};
use hashledger_core::codec;
use hashledger_core::{Block, Hash};
use sled::Db;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Active(Hash),
    /// The last block yielded links to something that cannot be a block key.
    Broken { hash: Hash, len: usize },
    Exhausted,
}

/// Walks blocks from a starting hash back to genesis.
///
/// Yields `Ok(block)` for each block, newest first. A lookup or decode
/// failure is yielded once as `Err` and ends the walk; `None` always means
/// genesis was reached (or a previous error was already reported).
///
/// The iterator holds its own store handle, so it is unaffected by later
/// appends and may outlive the ledger it came from. Block records are never
/// rewritten, so every block it yields links to the one yielded before it.
pub struct ChainIterator {
    db: Db,
    cursor: Cursor,
}

impl ChainIterator {
    pub(crate) fn new(db: Db, start: Hash) -> Self {
        Self {
            db,
            cursor: Cursor::Active(start),
        }
    }

    /// Hash the next call will look up, or `None` once exhausted.
    pub fn current_hash(&self) -> Option<Hash> {
        match self.cursor {
            Cursor::Active(hash) => Some(hash),
            Cursor::Broken { .. } | Cursor::Exhausted => None,
        }
    }

    fn load(&self, hash: Hash) -> Result<Block> {
        let raw = self.db.get(hash)?.ok_or(StorageError::BlockNotFound(hash))?;
        let block = codec::decode(&raw)?;
        if block.hash() != hash {
            return Err(StorageError::HashMismatch {
                key: hash,
                found: block.hash(),
            });
        }
        Ok(block)
    }
}

impl Iterator for ChainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = match self.cursor {
            Cursor::Active(hash) => hash,
            Cursor::Broken { hash, len } => {
                let e = StorageError::InvalidLink { hash, len };
                warn!(hash = %hash, error = %e, "chain walk stopped");
                self.cursor = Cursor::Exhausted;
                return Some(Err(e));
            }
            Cursor::Exhausted => return None,
        };

        match self.load(hash) {
            Ok(block) => {
                self.cursor = if block.is_genesis() {
                    Cursor::Exhausted
                } else {
                    match block.parent() {
                        Some(prev) => Cursor::Active(prev),
                        None => Cursor::Broken {
                            hash,
                            len: block.prev_hash().len(),
                        },
                    }
                };
                Some(Ok(block))
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "chain walk stopped");
                self.cursor = Cursor::Exhausted;
                Some(Err(e))
            }
        }
    }
}
