//! The append-only block ledger.

use crate::db::{Result, Storage, StorageError};
use crate::iterator::ChainIterator;
use hashledger_core::codec;
use hashledger_core::{
    Block, BlockTemplate, CancelFlag, Hash, Miner, MinerConfig, PayloadDigest, GENESIS_PAYLOAD,
};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use std::path::Path;
use tracing::{debug, info};

/// Reserved key holding the hash of the most recent block.
pub const TIP_KEY: &[u8] = b"last_hash";

/// Difficulty used for every block unless configured otherwise.
pub const DEFAULT_DIFFICULTY: i64 = 12;

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Fixed difficulty for genesis and every appended block.
    pub difficulty: i64,
    /// Parallel chunks per nonce search window.
    pub workers: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            workers: 1,
        }
    }
}

/// A single-writer chain of sealed blocks in a sled store.
///
/// Layout: `last_hash` maps to the tip hash, every other key is a 32-byte
/// block hash mapping to the block's encoded record.
pub struct Ledger {
    storage: Storage,
    tip: Hash,
    config: LedgerConfig,
    miner: Miner,
}

impl Ledger {
    /// Open the ledger at `path` with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, LedgerConfig::default())
    }

    /// Open the ledger at `path`, bootstrapping a genesis block if the store is new.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: LedgerConfig) -> Result<Self> {
        let storage = Storage::open(path)?;
        Self::from_storage(storage, config)
    }

    /// Build a ledger on already opened storage.
    ///
    /// An empty store is bootstrapped; anything else is recovered from its
    /// tip key.
    pub fn from_storage(storage: Storage, config: LedgerConfig) -> Result<Self> {
        let miner = Miner::new(MinerConfig {
            workers: config.workers,
            ..MinerConfig::default()
        });

        let tip = if storage.is_empty() {
            Self::bootstrap(&storage, &config, &miner)?
        } else {
            Self::recover(&storage)?
        };

        Ok(Self {
            storage,
            tip,
            config,
            miner,
        })
    }

    fn bootstrap(storage: &Storage, config: &LedgerConfig, miner: &Miner) -> Result<Hash> {
        let template = BlockTemplate::new(
            PayloadDigest::from_text(GENESIS_PAYLOAD),
            Vec::new(),
            config.difficulty,
        );
        let genesis = miner.seal(template, &CancelFlag::new())?;

        // Keep whichever genesis reached the store first.
        let existing = storage.transaction(|tx| match tx.get(TIP_KEY)? {
            Some(raw) => Ok(Some(raw)),
            None => {
                put_block(tx, &genesis)?;
                Ok(None)
            }
        })?;

        match existing {
            Some(raw) => Self::recover_from(&raw),
            None => {
                info!(hash = %genesis.hash(), "created genesis block");
                Ok(genesis.hash())
            }
        }
    }

    fn recover(storage: &Storage) -> Result<Hash> {
        let raw = storage.get(TIP_KEY)?.ok_or(StorageError::MissingTip)?;
        Self::recover_from(&raw)
    }

    fn recover_from(raw: &[u8]) -> Result<Hash> {
        let tip = parse_tip(raw)?;
        info!(tip = %tip, "recovered ledger");
        Ok(tip)
    }

    /// Hash of the most recently appended block.
    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn difficulty(&self) -> i64 {
        self.config.difficulty
    }

    /// Seal and persist a block carrying `payload` on top of the current tip.
    pub fn append(&mut self, payload: PayloadDigest) -> Result<Block> {
        self.append_with_cancel(payload, &CancelFlag::new())
    }

    /// Like [`Ledger::append`], but the nonce search stops when `cancel` is set.
    ///
    /// The block is sealed against the stored tip outside any transaction,
    /// then committed in a short one that writes the record and the new tip
    /// only if the tip is still the one sealed against. If another writer
    /// moved it, the block is re-sealed on the new tip. On any error nothing
    /// is written.
    pub fn append_with_cancel(
        &mut self,
        payload: PayloadDigest,
        cancel: &CancelFlag,
    ) -> Result<Block> {
        loop {
            let raw = self.storage.get(TIP_KEY)?.ok_or(StorageError::MissingTip)?;
            let tip = parse_tip(&raw)?;

            let template =
                BlockTemplate::new(payload.clone(), tip.as_ref().to_vec(), self.config.difficulty);
            let block = self.miner.seal(template, cancel)?;

            if self.commit(tip, &block)? {
                debug!(hash = %block.hash(), nonce = block.nonce(), "appended block");
                self.tip = block.hash();
                return Ok(block);
            }
            debug!(sealed_on = %tip, "tip moved while sealing, retrying");
        }
    }

    /// Write `block` and make it the tip if the tip is still `expected`.
    ///
    /// Returns false, writing nothing, when the tip has moved.
    fn commit(&self, expected: Hash, block: &Block) -> Result<bool> {
        self.storage.transaction(|tx| {
            let raw = tx.get(TIP_KEY)?.ok_or_else(|| abort(StorageError::MissingTip))?;
            if parse_tip(&raw).map_err(abort)? != expected {
                return Ok(false);
            }
            put_block(tx, block)?;
            Ok(true)
        })
    }

    /// Look up a block by hash without validating it.
    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        match self.storage.get(hash)? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Iterate from the tip back to genesis.
    pub fn iter(&self) -> ChainIterator {
        ChainIterator::new(self.storage.handle(), self.tip)
    }

    /// Flush and release the store.
    ///
    /// Iterators still alive keep their own handle; the directory lock is
    /// released once they are dropped too.
    pub fn close(self) -> Result<()> {
        self.storage.flush()?;
        info!(tip = %self.tip, "closed ledger");
        Ok(())
    }
}

fn abort(e: impl Into<StorageError>) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(e.into())
}

/// Write a block record and make it the tip.
fn put_block(
    tx: &TransactionalTree,
    block: &Block,
) -> std::result::Result<(), ConflictableTransactionError<StorageError>> {
    let record = codec::encode(block).map_err(abort)?;
    let hash = block.hash();
    tx.insert(hash.as_ref(), record)?;
    tx.insert(TIP_KEY, hash.as_ref())?;
    Ok(())
}

fn parse_tip(raw: &[u8]) -> Result<Hash> {
    Hash::from_slice(raw).ok_or(StorageError::InvalidTip(raw.len()))
}
