use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use qfc_core::{ChainError, Shard};

pub type SharedShard = Arc<Mutex<Shard>>;

/// The growable set of shards owned by the chain.
///
/// The outer `RwLock` serializes scale-ups; the per-shard `Mutex` keeps each
/// pending queue single-writer. Shard ids are dense indices, so a shard is
/// never removed and ids stay stable.
pub struct ShardSet {
    capacity: usize,
    shards: RwLock<Vec<SharedShard>>,
}

impl ShardSet {
    pub fn new(count: usize, capacity: usize) -> Self {
        let shards = (0..count.max(1) as u64)
            .map(|id| Arc::new(Mutex::new(Shard::new(id, capacity))))
            .collect();
        ShardSet {
            capacity,
            shards: RwLock::new(shards),
        }
    }

    /// Rebuild from a persisted snapshot. An empty set falls back to a
    /// single genesis shard so routing always has a target.
    pub fn from_existing(shards: Vec<Shard>, capacity: usize) -> Self {
        if shards.is_empty() {
            return ShardSet::new(1, capacity);
        }
        let shards = shards
            .into_iter()
            .map(|shard| Arc::new(Mutex::new(shard)))
            .collect();
        ShardSet {
            capacity,
            shards: RwLock::new(shards),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    /// Run a closure against one shard under its lock.
    pub fn with_shard<R>(
        &self,
        id: u64,
        f: impl FnOnce(&mut Shard) -> R,
    ) -> Result<R, ChainError> {
        let shard = {
            let shards = self.shards.read();
            shards
                .get(id as usize)
                .cloned()
                .ok_or(ChainError::UnknownShard(id))?
        };
        let mut guard = shard.lock();
        Ok(f(&mut guard))
    }

    pub fn average_utilization(&self) -> f64 {
        let shards = self.shards.read();
        let total: f64 = shards.iter().map(|s| s.lock().utilization()).sum();
        total / shards.len() as f64
    }

    /// Append one new genesis-only shard if average utilization exceeds the
    /// threshold. The write lock makes the check-and-grow atomic, so a
    /// single evaluation tick can only ever add one shard.
    pub fn scale_up_if_overloaded(&self, threshold: f64) -> Option<u64> {
        let mut shards = self.shards.write();
        let average: f64 =
            shards.iter().map(|s| s.lock().utilization()).sum::<f64>() / shards.len() as f64;
        if average <= threshold {
            return None;
        }
        let id = shards.len() as u64;
        shards.push(Arc::new(Mutex::new(Shard::new(id, self.capacity))));
        Some(id)
    }

    /// Clone every shard for a snapshot.
    pub fn clone_shards(&self) -> Vec<Shard> {
        self.shards.read().iter().map(|s| s.lock().clone()).collect()
    }

    /// Walk every shard chain verifying links and per-block hashes.
    pub fn validate_all(&self) -> bool {
        self.shards.read().iter().all(|s| s.lock().validate_chain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfc_core::Transaction;

    #[test]
    fn test_at_least_one_shard() {
        let set = ShardSet::new(0, 10);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_restore_from_empty_set_gets_genesis_shard() {
        let set = ShardSet::from_existing(Vec::new(), 10);
        assert_eq!(set.len(), 1);
        assert!(set.validate_all());
    }

    #[test]
    fn test_unknown_shard_is_an_error() {
        let set = ShardSet::new(2, 10);
        let err = set.with_shard(9, |_| ()).unwrap_err();
        assert_eq!(err, ChainError::UnknownShard(9));
    }

    #[test]
    fn test_scale_up_only_when_overloaded() {
        let set = ShardSet::new(2, 10);
        assert_eq!(set.scale_up_if_overloaded(0.8), None);

        // 9/10 and 8/10 pending: average utilization 0.85.
        set.with_shard(0, |s| {
            for _ in 0..9 {
                s.push_transaction(Transaction::new("0xa", "0xb", 1.0));
            }
        })
        .unwrap();
        set.with_shard(1, |s| {
            for _ in 0..8 {
                s.push_transaction(Transaction::new("0xc", "0xd", 1.0));
            }
        })
        .unwrap();

        let new_id = set.scale_up_if_overloaded(0.8);
        assert_eq!(new_id, Some(2));
        assert_eq!(set.len(), 3);

        // The new shard is genesis-only and empty.
        set.with_shard(2, |s| {
            assert_eq!(s.chain.len(), 1);
            assert!(s.pending_transactions.is_empty());
        })
        .unwrap();
    }

    #[test]
    fn test_validate_all_sees_every_shard() {
        let set = ShardSet::new(3, 10);
        assert!(set.validate_all());
        set.with_shard(1, |s| s.chain[0].previous_hash = "tampered".into())
            .unwrap();
        assert!(!set.validate_all());
    }
}
