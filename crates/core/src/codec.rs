//! Persisted block record format.
//!
//! A record is a JSON object with the fields `hash`, `merkleRoot`,
//! `prevHash`, `nonce`, `difficulty` and `timestamp`. Byte fields are
//! standard base64 strings; `null` is read as empty. Decoding trusts the
//! stored fields and does not re-check the proof of work, use
//! [`Block::validate`] for that.

use crate::block::{Block, PayloadDigest};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` must be {expected} bytes, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: &'static str,
        got: usize,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockRecord {
    #[serde(with = "base64_bytes")]
    hash: Vec<u8>,
    #[serde(with = "base64_bytes")]
    merkle_root: Vec<u8>,
    #[serde(with = "base64_bytes")]
    prev_hash: Vec<u8>,
    nonce: i64,
    difficulty: i64,
    timestamp: i64,
}

/// Encode a block as a record.
pub fn encode(block: &Block) -> Result<Vec<u8>, CodecError> {
    let record = BlockRecord {
        hash: block.hash.as_ref().to_vec(),
        merkle_root: block.payload_digest.as_bytes().to_vec(),
        prev_hash: block.prev_hash.clone(),
        nonce: block.nonce,
        difficulty: block.difficulty,
        timestamp: block.timestamp,
    };
    Ok(serde_json::to_vec(&record)?)
}

/// Decode a record into a block.
pub fn decode(bytes: &[u8]) -> Result<Block, CodecError> {
    let record: BlockRecord = serde_json::from_slice(bytes)?;

    let hash = Hash::from_slice(&record.hash).ok_or(CodecError::InvalidLength {
        field: "hash",
        expected: "32",
        got: record.hash.len(),
    })?;

    Ok(Block {
        hash,
        payload_digest: PayloadDigest::new(record.merkle_root),
        prev_hash: record.prev_hash,
        nonce: record.nonce,
        difficulty: record.difficulty,
        timestamp: record.timestamp,
    })
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
