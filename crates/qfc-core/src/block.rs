use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;

/// Provenance carried by every block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockMetadata {
    /// Address that mined the block; `None` for genesis blocks.
    pub miner: Option<String>,
    pub shard_id: u64,
}

/// One block in a shard's chain.
///
/// `hash` is a pure function of the other fields: it always equals
/// `compute_hash()` for a well-formed block, and `previous_hash` of block N
/// equals `hash` of block N-1 within the same shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub timestamp: i64,
    pub metadata: BlockMetadata,
    pub hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        metadata: BlockMetadata,
    ) -> Self {
        let mut block = Block {
            index,
            transactions,
            previous_hash,
            nonce: 0,
            timestamp: Utc::now().timestamp(),
            metadata,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The empty block that roots a shard's chain.
    pub fn genesis(shard_id: u64) -> Self {
        Block::new(
            0,
            Vec::new(),
            "0".to_string(),
            BlockMetadata {
                miner: None,
                shard_id,
            },
        )
    }

    /// Canonical serialization of everything the proof-of-work covers
    /// except the nonce. serde_json emits object keys in sorted order, so
    /// the payload is stable across processes.
    pub fn pow_payload(&self) -> String {
        json!({
            "index": self.index,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp,
            "metadata": self.metadata,
        })
        .to_string()
    }

    /// Hex SHA-256 digest over the canonical payload plus the nonce.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}{}", self.pow_payload(), self.nonce));
        hex::encode(hasher.finalize())
    }

    /// Whether a hash satisfies the difficulty target: at least
    /// `difficulty` leading zero hex digits.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        hash.len() >= difficulty as usize
            && hash.chars().take(difficulty as usize).all(|c| c == '0')
    }

    /// Increment the nonce until the recomputed hash meets the difficulty.
    pub fn mine(&mut self, difficulty: u32) {
        while !Self::meets_difficulty(&self.hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
        }
        info!(
            "Block {} mined in shard {}: {}",
            self.index, self.metadata.shard_id, self.hash
        );
    }

    /// Apply an externally found proof-of-work seal.
    ///
    /// The seal hash must equal the recomputed digest for the given nonce;
    /// callers obtain it from the same payload via the consensus engine.
    pub fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Stored hash matches the recomputed digest of the current fields.
    pub fn validate(&self) -> bool {
        self.hash == self.compute_hash()
    }
}
