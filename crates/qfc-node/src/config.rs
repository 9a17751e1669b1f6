use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

/// Node configuration, loadable from a JSON file.
///
/// Every field has a default, so a partial file (or none at all) still
/// yields a runnable node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Number of shards at genesis. Scaling can only grow this.
    pub num_shards: usize,
    /// Required leading zero hex digits in a block hash.
    pub difficulty: u32,
    pub total_supply: f64,
    /// Pending-queue capacity per shard, for utilization accounting.
    pub shard_capacity: usize,
    /// Base mining reward before the renewable adjustment.
    pub base_reward: f64,
    /// Shard task poll interval.
    pub poll_interval_ms: u64,
    /// Bound on concurrently mining worker threads across all shards.
    pub mining_workers: usize,
    /// Address credited with this node's mining rewards.
    pub miner_address: String,
    pub state_file: PathBuf,
    /// Balances credited at cold start.
    pub genesis_balances: HashMap<String, f64>,
    pub bootstrap: BootstrapConfig,
}

/// Consensus registrations applied at cold start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub validators: Vec<ValidatorBootstrap>,
    pub delegates: Vec<DelegateBootstrap>,
    pub renewable_nodes: Vec<RenewableNodeBootstrap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorBootstrap {
    pub address: String,
    pub stake: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateBootstrap {
    pub holder: String,
    pub validator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewableNodeBootstrap {
    pub node_id: String,
    pub renewable_ratio: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            num_shards: 3,
            difficulty: 3,
            total_supply: 1_000_000.0,
            shard_capacity: qfc_core::shard::DEFAULT_CAPACITY,
            base_reward: 50.0,
            poll_interval_ms: 500,
            mining_workers: 2,
            miner_address: "qfc-node-local".to_string(),
            state_file: PathBuf::from("qfc_state.json"),
            genesis_balances: HashMap::new(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Read a config file, falling back to defaults when it is missing or
    /// malformed.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        "Config at {} is malformed ({}); using defaults",
                        path.display(),
                        e
                    );
                    ChainConfig::default()
                }
            },
            Err(_) => {
                warn!("No config at {}; using defaults", path.display());
                ChainConfig::default()
            }
        }
    }
}
