//! Core ledger primitives for hashledger.
//!
//! This crate provides the types every other crate builds on:
//! - SHA-256 hashing and the 32-byte `Hash` type
//! - Blocks, payload digests and the canonical hash preimage
//! - Proof-of-work sealing and validation
//! - The persisted block record codec

pub mod block;
pub mod codec;
pub mod hash;
pub mod pow;

// Re-export commonly used types at the crate root
pub use block::{canonical_encoding_v1, Block, BlockTemplate, PayloadDigest, GENESIS_PAYLOAD};
pub use codec::CodecError;
pub use hash::{hash, Hash, H256};
pub use pow::{meets_difficulty, CancelFlag, Miner, MinerConfig, PowError, MAX_DIFFICULTY};
