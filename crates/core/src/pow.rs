//! Proof-of-work nonce search.
//!
//! A block is accepted when its hash, read as an unsigned 256-bit big-endian
//! integer, is below `2^(256 - difficulty)`. That is the same as requiring at
//! least `difficulty` leading zero bits, which is how the predicate is
//! evaluated here.
//!
//! The search walks the nonce space in windows of `workers * chunk_size`
//! nonces. Each window is split into `workers` contiguous chunks scanned in
//! parallel, and the lowest accepting nonce of the window wins. Because
//! earlier windows are exhausted before later ones start, the result is the
//! same nonce a single-threaded scan from the range start would find.

use crate::block::{Block, BlockTemplate};
use crate::hash::Hash;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Largest meaningful difficulty: a target of `2^0` accepts only the zero hash.
pub const MAX_DIFFICULTY: i64 = 256;

/// Errors that can occur while sealing a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("difficulty {0} is outside 0..=256")]
    InvalidDifficulty(i64),

    #[error("no accepting nonce in {start}..={end}")]
    Exhausted { start: i64, end: i64 },

    #[error("nonce search cancelled")]
    Cancelled,
}

/// Check that a difficulty can form a target.
pub fn check_difficulty(difficulty: i64) -> Result<(), PowError> {
    if (0..=MAX_DIFFICULTY).contains(&difficulty) {
        Ok(())
    } else {
        Err(PowError::InvalidDifficulty(difficulty))
    }
}

/// Returns true if `hash < 2^(256 - difficulty)`.
///
/// Difficulties outside `0..=256` never accept.
pub fn meets_difficulty(hash: &Hash, difficulty: i64) -> bool {
    if check_difficulty(difficulty).is_err() {
        return false;
    }
    i64::from(hash.leading_zero_bits()) >= difficulty
}

/// Shared flag used to stop a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search observing this flag to stop. Stays set.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Search configuration.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Number of chunks scanned concurrently per window. 1 scans on the calling thread.
    pub workers: usize,
    /// Nonces per chunk; the cancel flag is polled between chunks.
    pub chunk_size: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            chunk_size: 4096,
        }
    }
}

/// Hashes candidate nonces for one template.
///
/// The prefix `prev_hash ‖ payload` is absorbed once and the hasher state is
/// cloned per nonce.
struct SealHasher {
    prefix: Sha256,
    difficulty: [u8; 8],
    timestamp: [u8; 8],
}

impl SealHasher {
    fn new(template: &BlockTemplate) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(&template.prev_hash);
        prefix.update(template.payload_digest.as_bytes());
        Self {
            prefix,
            difficulty: template.difficulty.to_be_bytes(),
            timestamp: template.timestamp.to_be_bytes(),
        }
    }

    fn hash(&self, nonce: i64) -> Hash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_be_bytes());
        hasher.update(self.difficulty);
        hasher.update(self.timestamp);
        Hash(hasher.finalize().into())
    }

    /// First accepting nonce in `lo..=hi`.
    fn scan(&self, difficulty: i64, lo: i64, hi: i64) -> Option<(i64, Hash)> {
        (lo..=hi)
            .map(|nonce| (nonce, self.hash(nonce)))
            .find(|(_, hash)| meets_difficulty(hash, difficulty))
    }
}

/// Proof-of-work sealer.
#[derive(Debug, Clone, Default)]
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Seal a template by searching every non-negative nonce from zero.
    pub fn seal(&self, template: BlockTemplate, cancel: &CancelFlag) -> Result<Block, PowError> {
        let (nonce, hash) = self.search(&template, 0..=i64::MAX, cancel)?;
        debug!(nonce, hash = %hash, difficulty = template.difficulty, "sealed block");
        Ok(template.into_block(nonce, hash))
    }

    /// Find the lowest accepting nonce in `range`.
    ///
    /// Resuming a search is a matter of calling this again with a range that
    /// starts after the last nonce examined.
    pub fn search(
        &self,
        template: &BlockTemplate,
        range: RangeInclusive<i64>,
        cancel: &CancelFlag,
    ) -> Result<(i64, Hash), PowError> {
        check_difficulty(template.difficulty)?;

        let (start, end) = range.into_inner();
        let exhausted = PowError::Exhausted { start, end };
        if start > end {
            return Err(exhausted);
        }

        let hasher = SealHasher::new(template);
        let difficulty = template.difficulty;
        let workers = self.config.workers.max(1);
        // i128 keeps window arithmetic clear of overflow near i64::MAX.
        let chunk = i128::from(self.config.chunk_size.max(1));
        let end = i128::from(end);
        let mut window_start = i128::from(start);

        while window_start <= end {
            if cancel.is_cancelled() {
                return Err(PowError::Cancelled);
            }

            let chunk_bounds = |index: usize| {
                let lo = window_start + index as i128 * chunk;
                (lo <= end).then(|| (lo as i64, (lo + chunk - 1).min(end) as i64))
            };

            let found = if workers == 1 {
                chunk_bounds(0).and_then(|(lo, hi)| hasher.scan(difficulty, lo, hi))
            } else {
                (0..workers)
                    .into_par_iter()
                    .filter_map(|index| {
                        let (lo, hi) = chunk_bounds(index)?;
                        hasher.scan(difficulty, lo, hi)
                    })
                    .min_by_key(|(nonce, _)| *nonce)
            };

            if let Some(hit) = found {
                return Ok(hit);
            }
            window_start += chunk * workers as i128;
        }

        Err(exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{canonical_encoding_v1, PayloadDigest};
    use crate::hash::hash;

    fn template(difficulty: i64) -> BlockTemplate {
        BlockTemplate {
            payload_digest: PayloadDigest::from_text("pow test"),
            prev_hash: vec![0x11; 32],
            difficulty,
            timestamp: 1_700_000_000_000_000_000,
        }
    }

    #[test]
    fn test_meets_difficulty_boundaries() {
        let mut bytes = [0u8; 32];
        bytes[1] = 0x10; // 11 leading zero bits
        let h = Hash(bytes);

        assert!(meets_difficulty(&h, 0));
        assert!(meets_difficulty(&h, 11));
        assert!(!meets_difficulty(&h, 12));
        assert!(meets_difficulty(&Hash::ZERO, 256));
        assert!(!meets_difficulty(&Hash([0xFF; 32]), 1));
    }

    #[test]
    fn test_invalid_difficulty_never_accepts() {
        assert!(!meets_difficulty(&Hash::ZERO, -1));
        assert!(!meets_difficulty(&Hash::ZERO, 257));
    }

    #[test]
    fn test_seal_hasher_matches_canonical_encoding() {
        let t = template(8);
        let hasher = SealHasher::new(&t);
        for nonce in [0, 1, 42, i64::MAX] {
            let expected = hash(&canonical_encoding_v1(
                &t.prev_hash,
                t.payload_digest.as_bytes(),
                nonce,
                t.difficulty,
                t.timestamp,
            ));
            assert_eq!(hasher.hash(nonce), expected);
        }
    }

    #[test]
    fn test_search_finds_lowest_nonce() {
        let t = template(8);
        let (nonce, found) = Miner::default()
            .search(&t, 0..=i64::MAX, &CancelFlag::new())
            .unwrap();

        assert!(meets_difficulty(&found, 8));
        let hasher = SealHasher::new(&t);
        for earlier in 0..nonce {
            assert!(!meets_difficulty(&hasher.hash(earlier), 8));
        }
    }

    #[test]
    fn test_parallel_search_matches_sequential() {
        let t = template(10);
        let cancel = CancelFlag::new();
        let sequential = Miner::default().search(&t, 0..=i64::MAX, &cancel).unwrap();

        let parallel = Miner::new(MinerConfig {
            workers: 4,
            chunk_size: 64,
        })
        .search(&t, 0..=i64::MAX, &cancel)
        .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_search_resumes_after_range() {
        let t = template(6);
        let cancel = CancelFlag::new();
        let miner = Miner::default();
        let (first, _) = miner.search(&t, 0..=i64::MAX, &cancel).unwrap();
        let (second, _) = miner.search(&t, first + 1..=i64::MAX, &cancel).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_search_exhausts_small_range() {
        let t = template(MAX_DIFFICULTY);
        let result = Miner::default().search(&t, 0..=999, &CancelFlag::new());
        assert_eq!(result, Err(PowError::Exhausted { start: 0, end: 999 }));
    }

    #[test]
    fn test_search_near_max_nonce_does_not_overflow() {
        let t = template(MAX_DIFFICULTY);
        let miner = Miner::new(MinerConfig {
            workers: 3,
            chunk_size: 16,
        });
        let start = i64::MAX - 20;
        let result = miner.search(&t, start..=i64::MAX, &CancelFlag::new());
        assert_eq!(
            result,
            Err(PowError::Exhausted {
                start,
                end: i64::MAX
            })
        );
    }

    #[test]
    fn test_empty_range_is_exhausted() {
        let t = template(1);
        #[allow(clippy::reversed_empty_ranges)]
        let result = Miner::default().search(&t, 5..=4, &CancelFlag::new());
        assert_eq!(result, Err(PowError::Exhausted { start: 5, end: 4 }));
    }

    #[test]
    fn test_cancelled_search_stops() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = Miner::default().search(&template(MAX_DIFFICULTY), 0..=i64::MAX, &cancel);
        assert_eq!(result, Err(PowError::Cancelled));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let cancel = CancelFlag::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            Miner::default().search(&template(MAX_DIFFICULTY), 0..=i64::MAX, &remote)
        });
        cancel.cancel();
        assert_eq!(handle.join().unwrap(), Err(PowError::Cancelled));
    }

    #[test]
    fn test_invalid_difficulty_rejected() {
        let result = Miner::default().search(&template(300), 0..=10, &CancelFlag::new());
        assert_eq!(result, Err(PowError::InvalidDifficulty(300)));

        let result = Miner::default().seal(template(-1), &CancelFlag::new());
        assert_eq!(result, Err(PowError::InvalidDifficulty(-1)));
    }
}
