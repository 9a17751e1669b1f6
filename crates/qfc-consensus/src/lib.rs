// === Consensus Sub-Mechanisms ===
pub mod delegation;
pub mod green;
pub mod pow;
pub mod stake;

// === Coordinator ===
pub mod hybrid;

pub use delegation::DelegationRegistry;
pub use green::RenewableRegistry;
pub use hybrid::{HybridConsensus, MinedSeal};
pub use pow::ProofOfWork;
pub use stake::StakeRegistry;
