use std::sync::Arc;

use log::info;
use sha2::{Digest, Sha256};

use crate::shard_set::ShardSet;

/// Average-utilization threshold above which a new shard is added.
pub const SCALE_THRESHOLD: f64 = 0.8;

/// Deterministic transaction-to-shard routing plus dynamic scaling.
///
/// Routing policy: the first 8 bytes of the SHA-256 digest of the sender
/// address, modulo the current shard count. The same sender always lands on
/// the same shard between scaling events, so one shard holds the
/// authoritative pending state for an address.
pub struct ShardRouter {
    shards: Arc<ShardSet>,
}

impl ShardRouter {
    pub fn new(shards: Arc<ShardSet>) -> Self {
        ShardRouter { shards }
    }

    /// Shard id responsible for a sender address.
    pub fn route_transaction(&self, sender: &str) -> u64 {
        let digest = Sha256::digest(sender.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix) % self.shards.len() as u64
    }

    /// Where a queued transaction should move, if its home shard changed
    /// after a scaling event. `None` means it is already home.
    pub fn reroute_target(&self, sender: &str, current_shard: u64) -> Option<u64> {
        let home = self.route_transaction(sender);
        (home != current_shard).then_some(home)
    }

    /// Add one shard if the set is overloaded. Callers drive this from a
    /// single evaluation task, so at most one scale-up happens per tick.
    pub fn maybe_scale(&self) -> Option<u64> {
        let new_id = self.shards.scale_up_if_overloaded(SCALE_THRESHOLD)?;
        info!(
            "Average utilization exceeded {:.0}%; scaled out to {} shards",
            SCALE_THRESHOLD * 100.0,
            self.shards.len()
        );
        Some(new_id)
    }
}
