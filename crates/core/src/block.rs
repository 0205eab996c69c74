//! Sealed blocks and the canonical hash preimage.

use crate::hash::{hash, Hash};
use crate::pow::{meets_difficulty, CancelFlag, Miner, PowError};
use chrono::Utc;
use std::borrow::Cow;

/// Payload committed to by the genesis block.
pub const GENESIS_PAYLOAD: &str = "First Transaction from Genesis";

/// Opaque digest of a block's contents.
///
/// Today this is the flat payload itself, one payload per block. Sealing and
/// validation only ever see its bytes, so a real aggregate (a merkle root over
/// many items) can replace it without touching the proof of work.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayloadDigest(Vec<u8>);

impl PayloadDigest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Digest of a single text payload.
    pub fn from_text(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as text, replacing invalid UTF-8.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

/// Hash preimage layout, version 1.
///
/// `prev_hash ‖ payload ‖ BE64(nonce) ‖ BE64(difficulty) ‖ BE64(timestamp)`
/// with no length prefixes or separators. Any implementation that wants to
/// agree on block hashes must reproduce this byte for byte.
pub fn canonical_encoding_v1(
    prev_hash: &[u8],
    payload: &[u8],
    nonce: i64,
    difficulty: i64,
    timestamp: i64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(prev_hash.len() + payload.len() + 24);
    out.extend_from_slice(prev_hash);
    out.extend_from_slice(payload);
    out.extend_from_slice(&nonce.to_be_bytes());
    out.extend_from_slice(&difficulty.to_be_bytes());
    out.extend_from_slice(&timestamp.to_be_bytes());
    out
}

/// Current time in nanoseconds since the Unix epoch.
pub fn current_timestamp() -> i64 {
    // Only out of range after the year 2262.
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Every field a block hash commits to except the nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub payload_digest: PayloadDigest,
    /// Link to the predecessor; empty only for genesis.
    pub prev_hash: Vec<u8>,
    pub difficulty: i64,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
}

impl BlockTemplate {
    /// Template stamped with the current time.
    pub fn new(payload_digest: PayloadDigest, prev_hash: Vec<u8>, difficulty: i64) -> Self {
        Self {
            payload_digest,
            prev_hash,
            difficulty,
            timestamp: current_timestamp(),
        }
    }

    /// Hash of this template under a given nonce.
    pub fn hash_with_nonce(&self, nonce: i64) -> Hash {
        hash(&canonical_encoding_v1(
            &self.prev_hash,
            self.payload_digest.as_bytes(),
            nonce,
            self.difficulty,
            self.timestamp,
        ))
    }

    /// Attach the search result. Callers are expected to pass a hash produced
    /// by [`BlockTemplate::hash_with_nonce`].
    pub(crate) fn into_block(self, nonce: i64, hash: Hash) -> Block {
        Block {
            hash,
            payload_digest: self.payload_digest,
            prev_hash: self.prev_hash,
            nonce,
            difficulty: self.difficulty,
            timestamp: self.timestamp,
        }
    }
}

/// A sealed block. Fields are read-only once sealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) hash: Hash,
    pub(crate) payload_digest: PayloadDigest,
    pub(crate) prev_hash: Vec<u8>,
    pub(crate) nonce: i64,
    pub(crate) difficulty: i64,
    pub(crate) timestamp: i64,
}

impl Block {
    /// Seal a new block on the calling thread.
    pub fn new(
        payload_digest: PayloadDigest,
        prev_hash: Vec<u8>,
        difficulty: i64,
    ) -> Result<Self, PowError> {
        let template = BlockTemplate::new(payload_digest, prev_hash, difficulty);
        Miner::default().seal(template, &CancelFlag::new())
    }

    /// Seal the genesis block.
    pub fn genesis(difficulty: i64) -> Result<Self, PowError> {
        Self::new(PayloadDigest::from_text(GENESIS_PAYLOAD), Vec::new(), difficulty)
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn payload_digest(&self) -> &PayloadDigest {
        &self.payload_digest
    }

    /// Raw link to the predecessor, empty for genesis.
    pub fn prev_hash(&self) -> &[u8] {
        &self.prev_hash
    }

    /// The predecessor's hash, if the link is a well-formed 32-byte hash.
    pub fn parent(&self) -> Option<Hash> {
        Hash::from_slice(&self.prev_hash)
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn difficulty(&self) -> i64 {
        self.difficulty
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// Exponent of the acceptance target, `256 - difficulty`.
    pub fn target_exponent(&self) -> i64 {
        256 - self.difficulty
    }

    /// Rebuild the hash from the stored fields.
    pub fn recompute_hash(&self) -> Hash {
        self.template().hash_with_nonce(self.nonce)
    }

    /// Re-run the acceptance check on the stored fields.
    ///
    /// The hash is recomputed rather than trusted: it must equal the stored
    /// hash and fall below the target.
    pub fn validate(&self) -> bool {
        let recomputed = self.recompute_hash();
        recomputed == self.hash && meets_difficulty(&recomputed, self.difficulty)
    }

    /// The fields this block's hash commits to, without the nonce.
    pub fn template(&self) -> BlockTemplate {
        BlockTemplate {
            payload_digest: self.payload_digest.clone(),
            prev_hash: self.prev_hash.clone(),
            difficulty: self.difficulty,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_DIFFICULTY: i64 = 12;

    fn sealed(payload: &str, prev: &[u8]) -> Block {
        Block::new(PayloadDigest::from_text(payload), prev.to_vec(), TEST_DIFFICULTY).unwrap()
    }

    /// Independent check of `hash < 2^(256 - d)` on raw bytes.
    fn below_target(hash: &Hash, difficulty: i64) -> bool {
        let d = difficulty as usize;
        let full = d / 8;
        let rest = d % 8;
        hash.0[..full].iter().all(|b| *b == 0)
            && (rest == 0 || hash.0[full] < (1u8 << (8 - rest)))
    }

    #[test]
    fn test_canonical_encoding_layout() {
        let encoded = canonical_encoding_v1(&[0xAA, 0xBB], b"hi", 1, 2, 3);
        let mut expected = vec![0xAA, 0xBB, b'h', b'i'];
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 2]);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_canonical_encoding_negative_is_twos_complement() {
        let encoded = canonical_encoding_v1(&[], &[], -1, 0, 0);
        assert_eq!(&encoded[..8], &[0xFF; 8]);
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(TEST_DIFFICULTY).unwrap();

        assert!(genesis.is_genesis());
        assert!(genesis.prev_hash().is_empty());
        assert_eq!(genesis.parent(), None);
        assert_eq!(genesis.payload_digest().as_bytes(), GENESIS_PAYLOAD.as_bytes());
        assert_eq!(genesis.difficulty(), TEST_DIFFICULTY);
        assert!(genesis.validate());
        assert!(below_target(&genesis.hash(), TEST_DIFFICULTY));
    }

    #[test]
    fn test_difficulty_12_scenario() {
        let genesis = Block::genesis(12).unwrap();
        assert!(genesis.hash().leading_zero_bits() >= 12);
        assert_eq!(genesis.target_exponent(), 244);

        let next = sealed("hello", genesis.hash().as_ref());
        assert_eq!(next.prev_hash(), genesis.hash().as_ref());
        assert_eq!(next.parent(), Some(genesis.hash()));
        assert!(below_target(&next.hash(), 12));
        assert!(!next.is_genesis());
    }

    #[test]
    fn test_stored_hash_matches_recomputed() {
        let block = sealed("payload", &[3; 32]);
        assert_eq!(block.hash(), block.recompute_hash());
    }

    #[test]
    fn test_empty_payload_allowed() {
        let block = Block::new(PayloadDigest::default(), vec![1; 32], 4).unwrap();
        assert!(block.payload_digest().is_empty());
        assert!(block.validate());
    }

    #[test]
    fn test_invalid_difficulty_fails_to_seal() {
        assert_eq!(
            Block::new(PayloadDigest::from_text("x"), Vec::new(), 257),
            Err(PowError::InvalidDifficulty(257))
        );
    }

    #[test]
    fn test_mutating_any_field_invalidates() {
        let block = sealed("a", &[9; 32]);
        assert!(block.validate());

        let mut b = block.clone();
        b.nonce += 1;
        assert!(!b.validate());

        let mut b = block.clone();
        b.prev_hash = vec![8; 32];
        assert!(!b.validate());

        let mut b = block.clone();
        b.prev_hash.clear();
        assert!(!b.validate());

        let mut b = block.clone();
        b.prev_hash.push(0);
        assert!(!b.validate());

        let mut b = block.clone();
        b.payload_digest = PayloadDigest::from_text("b");
        assert!(!b.validate());

        let mut b = block.clone();
        b.difficulty -= 1;
        assert!(!b.validate());

        let mut b = block.clone();
        b.timestamp += 1;
        assert!(!b.validate());
    }

    #[test]
    fn test_prev_hash_is_opaque() {
        let block = sealed("short link", &[0xAB; 5]);
        assert!(block.validate());
        assert!(!block.is_genesis());
        assert_eq!(block.prev_hash(), &[0xAB; 5]);
        assert_eq!(block.parent(), None);
    }

    #[test]
    fn test_forged_hash_invalidates() {
        let mut block = sealed("a", &[]);
        block.hash = Hash::ZERO;
        assert!(!block.validate());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_sealed_hash_below_target(
            difficulty in 1i64..=10,
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            prev in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let block = Block::new(PayloadDigest::new(payload), prev.clone(), difficulty).unwrap();
            prop_assert_eq!(block.prev_hash(), prev.as_slice());
            prop_assert!(below_target(&block.hash(), difficulty));
            prop_assert!(block.validate());
            prop_assert_eq!(block.hash(), block.recompute_hash());
        }
    }
}
