use thiserror::Error;

/// Ledger-wide error taxonomy.
///
/// Every failure mode in the core maps onto one of four coarse categories
/// (see [`ChainError::classification`]): validation failures are rejected and
/// never retried, consensus-unavailable failures make the shard back off and
/// retry the whole batch, state corruption halts the shard, and persistence
/// failures are retried with backoff.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    #[error("insufficient balance for {address}: need {required}, have {available}")]
    InsufficientBalance {
        address: String,
        required: f64,
        available: f64,
    },

    #[error("transaction carries no signature")]
    MissingSignature,

    #[error("transaction is already signed; reset the signature to re-sign")]
    AlreadySigned,

    #[error("transaction signature is invalid")]
    InvalidSignature,

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("insufficient stake for {address}: offered {offered}, spendable {available}")]
    InsufficientStake {
        address: String,
        offered: f64,
        available: f64,
    },

    #[error("no validators registered")]
    NoValidators,

    #[error("no delegates registered")]
    NoDelegates,

    #[error("nonce search exhausted after {attempts} attempts at difficulty {difficulty}")]
    NonceSearchExhausted { attempts: u64, difficulty: u32 },

    #[error("unknown shard {0}")]
    UnknownShard(u64),

    #[error("state corruption in shard {shard_id}: {reason}")]
    StateCorruption { shard_id: u64, reason: String },

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ChainError {
    /// Coarse, non-leaking category for untrusted callers.
    ///
    /// API layers report this string instead of the full error text, which
    /// may mention internal addresses and amounts.
    pub fn classification(&self) -> &'static str {
        match self {
            ChainError::InsufficientBalance { .. }
            | ChainError::MissingSignature
            | ChainError::AlreadySigned
            | ChainError::InvalidSignature
            | ChainError::MalformedTransaction(_)
            | ChainError::InsufficientStake { .. }
            | ChainError::UnknownShard(_) => "validation",
            ChainError::NoValidators
            | ChainError::NoDelegates
            | ChainError::NonceSearchExhausted { .. } => "consensus-unavailable",
            ChainError::StateCorruption { .. } => "state-corruption",
            ChainError::Persistence(_) => "persistence",
        }
    }

    /// Whether the shard task should requeue the batch and retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self.classification(), "consensus-unavailable" | "persistence")
    }
}
