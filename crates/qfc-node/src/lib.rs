// === Node Orchestration ===
pub mod chain;
pub mod config;
pub mod router;
pub mod shard_set;

pub use chain::Blockchain;
pub use config::ChainConfig;
pub use router::ShardRouter;
pub use shard_set::ShardSet;
