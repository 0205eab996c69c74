//! sled database wrapper.

use hashledger_core::{CodecError, Hash, PowError};
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionalTree};
use sled::{Db, IVec};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("record error: {0}")]
    Codec(#[from] CodecError),

    #[error("proof of work failed: {0}")]
    ProofOfWork(#[from] PowError),

    #[error("block not found: {0}")]
    BlockNotFound(Hash),

    #[error("record stored under {key} carries hash {found}")]
    HashMismatch { key: Hash, found: Hash },

    #[error("block {hash} links to a {len}-byte prev hash")]
    InvalidLink { hash: Hash, len: usize },

    #[error("store holds data but no tip")]
    MissingTip,

    #[error("invalid tip: expected 32 bytes, got {0}")]
    InvalidTip(usize),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around a sled database.
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path, creating it if needed.
    ///
    /// sled holds an exclusive lock on the directory for as long as any
    /// handle to the database is alive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|source| StorageError::Open {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Self { db })
    }

    /// Retrieve raw bytes.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<IVec>> {
        Ok(self.db.get(key)?)
    }

    /// True if nothing has ever been written.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Clone of the underlying handle. Handles share one database and keep it
    /// open until the last one is dropped.
    pub fn handle(&self) -> Db {
        self.db.clone()
    }

    /// Run `f` as a serializable transaction.
    ///
    /// sled may run the closure more than once on conflict; only the final
    /// run's writes take effect, and an aborted run writes nothing.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&TransactionalTree) -> ConflictableTransactionResult<T, StorageError>,
    {
        self.db.transaction(f).map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StorageError::Database(e),
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
