// === Ledger Entities ===
pub mod block;
pub mod shard;
pub mod transaction;

// === Error Taxonomy ===
pub mod error;

// === Re-exports for broader ecosystem access ===
pub use block::{Block, BlockMetadata};
pub use error::ChainError;
pub use shard::Shard;
pub use transaction::Transaction;
