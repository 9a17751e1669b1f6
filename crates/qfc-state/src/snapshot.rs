use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use qfc_core::{ChainError, Shard};

use crate::state_manager::StateManager;

/// Whole-chain snapshot: every shard plus the balance ledger.
///
/// Written as a single JSON document. Loading a missing or unreadable file
/// is not fatal; the node cold-starts with a fresh genesis configuration
/// instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub total_supply: f64,
    pub balances: HashMap<String, f64>,
    pub reward_pool: f64,
    pub shards: Vec<Shard>,
}

impl ChainSnapshot {
    pub fn capture(state: &StateManager, shards: Vec<Shard>) -> Self {
        ChainSnapshot {
            total_supply: state.total_supply(),
            balances: state.balances().clone(),
            reward_pool: state.reward_pool(),
            shards,
        }
    }

    /// Persist the snapshot, writing to a sibling temp file first so a
    /// crash mid-write cannot truncate the previous good snapshot.
    pub fn save(&self, path: &Path) -> Result<(), ChainError> {
        let encoded = serde_json::to_vec_pretty(self)
            .map_err(|e| ChainError::Persistence(format!("snapshot encoding failed: {}", e)))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &encoded)
            .map_err(|e| ChainError::Persistence(format!("snapshot write failed: {}", e)))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| ChainError::Persistence(format!("snapshot rename failed: {}", e)))?;
        info!(
            "Chain state saved to {} ({} shards)",
            path.display(),
            self.shards.len()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let bytes = fs::read(path)
            .map_err(|e| ChainError::Persistence(format!("snapshot read failed: {}", e)))?;
        let snapshot: ChainSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| ChainError::Persistence(format!("snapshot decode failed: {}", e)))?;

        // A running chain always has at least one shard; a snapshot without
        // any cannot have come from one.
        if snapshot.shards.is_empty() {
            return Err(ChainError::Persistence(
                "snapshot contains no shards".into(),
            ));
        }
        for shard in &snapshot.shards {
            if !shard.validate_chain() {
                return Err(ChainError::StateCorruption {
                    shard_id: shard.id,
                    reason: "loaded shard chain fails validation".into(),
                });
            }
        }
        Ok(snapshot)
    }

    /// Load a snapshot, falling back to `None` (cold start) when the file
    /// is absent or unreadable. Corruption is logged but also cold-starts;
    /// the operator still has the file on disk for inspection.
    pub fn load_or_cold_start(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(
                    "No usable snapshot at {} ({}); starting fresh",
                    path.display(),
                    e.classification()
                );
                None
            }
        }
    }

    /// Rebuild the live state manager and shard set.
    pub fn into_parts(self) -> (StateManager, Vec<Shard>) {
        let state = StateManager::from_parts(self.total_supply, self.balances, self.reward_pool);
        (state, self.shards)
    }
}
