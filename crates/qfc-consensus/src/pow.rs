use log::info;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use qfc_core::{Block, ChainError};

/// Attempt cap per search; one batch is retried on the next tick rather
/// than spinning forever on an unreachable target.
const MAX_ATTEMPTS: u64 = 50_000_000;

/// Proof-of-work nonce search.
///
/// The starting nonce is drawn from the OS CSPRNG, so a search is not
/// derivable from prior outputs; within a search the nonce increments, so
/// no value repeats.
#[derive(Debug, Default)]
pub struct ProofOfWork;

impl ProofOfWork {
    pub fn new() -> Self {
        ProofOfWork
    }

    /// Digest checked against the difficulty target.
    fn digest(block_data: &str, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}{}", block_data, nonce));
        hex::encode(hasher.finalize())
    }

    /// Search for a nonce whose digest has `difficulty` leading zero hex
    /// digits. Returns the nonce and the winning hash.
    pub fn mine(&self, block_data: &str, difficulty: u32) -> Result<(u64, String), ChainError> {
        // A hex SHA-256 digest has 64 digits; a longer target can never be
        // met, so fail without burning the attempt budget.
        if difficulty as usize > 64 {
            return Err(ChainError::NonceSearchExhausted {
                attempts: 0,
                difficulty,
            });
        }
        let start = OsRng.next_u64();

        for attempt in 0..MAX_ATTEMPTS {
            let nonce = start.wrapping_add(attempt);
            let hash = Self::digest(block_data, nonce);
            if Block::meets_difficulty(&hash, difficulty) {
                info!(
                    "PoW found at difficulty {}: nonce={}, hash={}",
                    difficulty,
                    nonce,
                    &hash[..16.min(hash.len())]
                );
                return Ok((nonce, hash));
            }
        }

        Err(ChainError::NonceSearchExhausted {
            attempts: MAX_ATTEMPTS,
            difficulty,
        })
    }

    /// Check a claimed nonce against the difficulty target.
    pub fn validate(&self, block_data: &str, nonce: u64, difficulty: u32) -> bool {
        Block::meets_difficulty(&Self::digest(block_data, nonce), difficulty)
    }
}
