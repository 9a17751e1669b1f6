use std::collections::VecDeque;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::ChainError;
use crate::transaction::Transaction;

/// Default pending-queue capacity used for utilization accounting.
pub const DEFAULT_CAPACITY: usize = 100;

/// An independently chained partition of the ledger.
///
/// The chain is never empty: a genesis block is present from construction,
/// and every appended block must link to the current tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: u64,
    pub chain: Vec<Block>,
    pub pending_transactions: VecDeque<Transaction>,
    pub capacity: usize,
}

impl Shard {
    pub fn new(id: u64, capacity: usize) -> Self {
        info!("Shard {} created with genesis block", id);
        Shard {
            id,
            chain: vec![Block::genesis(id)],
            pending_transactions: VecDeque::new(),
            capacity,
        }
    }

    pub fn latest_block(&self) -> &Block {
        // Invariant: chain is non-empty from construction onward.
        self.chain.last().expect("shard chain contains genesis")
    }

    pub fn next_index(&self) -> u64 {
        self.chain.len() as u64
    }

    /// Append a mined block, enforcing the link and hash invariants.
    pub fn append_block(&mut self, block: Block) -> Result<(), ChainError> {
        if block.previous_hash != self.latest_block().hash {
            return Err(ChainError::StateCorruption {
                shard_id: self.id,
                reason: format!(
                    "block {} does not link to tip {}",
                    block.index,
                    self.latest_block().index
                ),
            });
        }
        if !block.validate() {
            return Err(ChainError::StateCorruption {
                shard_id: self.id,
                reason: format!("block {} hash does not match its contents", block.index),
            });
        }
        debug!("Shard {} appended block {}", self.id, block.index);
        self.chain.push(block);
        Ok(())
    }

    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.pending_transactions.push_back(transaction);
    }

    /// Requeue transactions at the front, preserving their original order.
    pub fn requeue_transactions(&mut self, batch: Vec<Transaction>) {
        for tx in batch.into_iter().rev() {
            self.pending_transactions.push_front(tx);
        }
    }

    /// Drain the entire pending queue in FIFO order.
    pub fn drain_pending(&mut self) -> Vec<Transaction> {
        self.pending_transactions.drain(..).collect()
    }

    /// Ratio of queued transactions to configured capacity.
    pub fn utilization(&self) -> f64 {
        self.pending_transactions.len() as f64 / self.capacity as f64
    }

    /// Walk the full chain verifying per-block hashes and links.
    pub fn validate_chain(&self) -> bool {
        for window in self.chain.windows(2) {
            let (previous, current) = (&window[0], &window[1]);
            if current.previous_hash != previous.hash || !current.validate() {
                return false;
            }
        }
        self.chain.first().is_some_and(|genesis| genesis.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockMetadata;

    fn mined_block(shard: &Shard) -> Block {
        let mut block = Block::new(
            shard.next_index(),
            Vec::new(),
            shard.latest_block().hash.clone(),
            BlockMetadata {
                miner: Some("0xminer".into()),
                shard_id: shard.id,
            },
        );
        block.mine(1);
        block
    }

    #[test]
    fn test_new_shard_is_genesis_only() {
        let shard = Shard::new(0, DEFAULT_CAPACITY);
        assert_eq!(shard.chain.len(), 1);
        assert!(shard.validate_chain());
        assert_eq!(shard.utilization(), 0.0);
    }

    #[test]
    fn test_append_links_to_tip() {
        let mut shard = Shard::new(0, DEFAULT_CAPACITY);
        let block = mined_block(&shard);
        assert!(shard.append_block(block).is_ok());
        assert_eq!(shard.chain.len(), 2);
        assert!(shard.validate_chain());
    }

    #[test]
    fn test_append_rejects_broken_link() {
        let mut shard = Shard::new(0, DEFAULT_CAPACITY);
        let mut block = mined_block(&shard);
        block.previous_hash = "dead".into();
        block.hash = block.compute_hash();
        let err = shard.append_block(block).unwrap_err();
        assert_eq!(err.classification(), "state-corruption");
        assert_eq!(shard.chain.len(), 1);
    }

    #[test]
    fn test_append_rejects_tampered_block() {
        let mut shard = Shard::new(0, DEFAULT_CAPACITY);
        let mut block = mined_block(&shard);
        block.hash = "0".repeat(64);
        assert!(shard.append_block(block).is_err());
    }

    #[test]
    fn test_validate_chain_detects_rewrite() {
        let mut shard = Shard::new(0, DEFAULT_CAPACITY);
        shard.append_block(mined_block(&shard)).unwrap();
        assert!(shard.validate_chain());
        shard.chain[1].previous_hash = "beef".into();
        assert!(!shard.validate_chain());
    }

    #[test]
    fn test_utilization_tracks_queue() {
        let mut shard = Shard::new(0, 10);
        for _ in 0..8 {
            shard.push_transaction(Transaction::new("0xaaa", "0xbbb", 1.0));
        }
        assert!((shard.utilization() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drain_and_requeue_preserve_fifo() {
        let mut shard = Shard::new(0, DEFAULT_CAPACITY);
        let first = Transaction::new("0xaaa", "0xbbb", 1.0);
        let second = Transaction::new("0xccc", "0xddd", 2.0);
        shard.push_transaction(first.clone());
        shard.push_transaction(second.clone());

        let batch = shard.drain_pending();
        assert_eq!(batch, vec![first.clone(), second.clone()]);
        assert!(shard.pending_transactions.is_empty());

        shard.requeue_transactions(batch);
        assert_eq!(shard.drain_pending(), vec![first, second]);
    }
}
