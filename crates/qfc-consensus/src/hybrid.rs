use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use qfc_core::{ChainError, Transaction};
use qfc_state::StateManager;

use crate::delegation::DelegationRegistry;
use crate::green::RenewableRegistry;
use crate::pow::ProofOfWork;
use crate::stake::StakeRegistry;

/// Result of a successful block-production attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedSeal {
    pub nonce: u64,
    pub hash: String,
    pub reward: f64,
}

/// Hybrid consensus coordinator.
///
/// Holds one instance of each sub-mechanism and always runs all four; this
/// is a tagged composition with explicit sequencing, never a one-of-many
/// selection. The coordinator references the single shared state manager
/// and mutates it only through its validated-update API.
pub struct HybridConsensus {
    pow: ProofOfWork,
    stake: RwLock<StakeRegistry>,
    delegation: RwLock<DelegationRegistry>,
    renewable: RwLock<RenewableRegistry>,
    state: Arc<RwLock<StateManager>>,
}

impl HybridConsensus {
    pub fn new(state: Arc<RwLock<StateManager>>) -> Self {
        HybridConsensus {
            pow: ProofOfWork::new(),
            stake: RwLock::new(StakeRegistry::new()),
            delegation: RwLock::new(DelegationRegistry::new()),
            renewable: RwLock::new(RenewableRegistry::new()),
            state,
        }
    }

    /// Register a validator, locking its stake (QPoS).
    pub fn register_validator(&self, address: &str, stake: f64) -> Result<(), ChainError> {
        let mut state = self.state.write();
        self.stake.write().register_validator(&mut state, address, stake)
    }

    /// Register a delegation, last write wins (QDPoS).
    pub fn register_delegate(&self, holder: &str, validator: &str) {
        self.delegation.write().register_delegate(holder, validator);
    }

    /// Register a node's renewable ratio (GPoW).
    pub fn register_renewable_node(&self, node_id: &str, renewable_ratio: f64) {
        self.renewable.write().register_node(node_id, renewable_ratio);
    }

    pub fn validator_stake(&self, address: &str) -> f64 {
        self.stake.read().stake_of(address)
    }

    /// Hybrid transaction validation.
    ///
    /// A stake-weighted validator is selected to vouch for the transaction
    /// (an empty registry is a hard failure), the signature must be
    /// present, and the state manager performs the balance check. The
    /// vouching validator is logged for audit, not for fault attribution.
    pub fn validate_transaction(&self, transaction: &Transaction) -> Result<(), ChainError> {
        let validator = self.stake.read().select_validator()?;

        if transaction.signature.is_none() {
            warn!(
                "Transaction from {} rejected: unsigned",
                transaction.sender
            );
            return Err(ChainError::MissingSignature);
        }

        match self.state.read().validate_transaction(transaction) {
            Ok(()) => {
                info!(
                    "Transaction {} vouched by validator {}: valid",
                    transaction.hash(),
                    validator
                );
                Ok(())
            }
            Err(e) => {
                info!(
                    "Transaction {} vouched by validator {}: rejected ({})",
                    transaction.hash(),
                    validator,
                    e.classification()
                );
                Err(e)
            }
        }
    }

    /// Delegated block-content validation (QDPoS).
    ///
    /// `Err(NoDelegates)` lets the caller back off and retry the batch;
    /// `Ok(false)` means a registered delegate's validator rejected the
    /// content.
    pub fn delegated_block_check(&self, transactions: &[Transaction]) -> Result<bool, ChainError> {
        let delegation = self.delegation.read();
        if delegation.is_empty() {
            return Err(ChainError::NoDelegates);
        }
        Ok(delegation.validate_block(transactions, &self.state.read()))
    }

    /// Mine a block: proof-of-work nonce search, then the GPoW-adjusted
    /// reward for the miner. The reward is credited only after a valid
    /// nonce is found; a miner that never registered a renewable ratio
    /// earns nothing.
    pub fn mine_block(
        &self,
        block_data: &str,
        miner_id: &str,
        difficulty: u32,
        base_reward: f64,
    ) -> Result<MinedSeal, ChainError> {
        let (nonce, hash) = self.pow.mine(block_data, difficulty)?;

        let reward = self.renewable.read().adjusted_reward(miner_id, base_reward);
        if reward > 0.0 {
            self.state.write().reward_miner(miner_id, reward);
        } else {
            info!(
                "Miner {} has no renewable registration; no reward credited",
                miner_id
            );
        }

        Ok(MinedSeal {
            nonce,
            hash,
            reward,
        })
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfc_crypto::Wallet;

    fn consensus_with_funds(addresses: &[(&str, f64)]) -> HybridConsensus {
        let mut state = StateManager::new(1_000_000.0);
        for (address, balance) in addresses {
            state.credit(address, *balance);
        }
        HybridConsensus::new(Arc::new(RwLock::new(state)))
    }

    fn signed_tx(wallet: &Wallet, recipient: &str, amount: f64) -> Transaction {
        let mut tx = Transaction::new(wallet.address(), recipient, amount);
        tx.sign(wallet.secret_key()).unwrap();
        tx
    }

    #[test]
    fn test_validate_requires_validators() {
        let wallet = Wallet::new();
        let consensus = consensus_with_funds(&[(wallet.address(), 1_000.0)]);
        let tx = signed_tx(&wallet, "0xrecipient", 50.0);
        assert_eq!(
            consensus.validate_transaction(&tx),
            Err(ChainError::NoValidators)
        );
    }

    #[test]
    fn test_validate_happy_path() {
        let wallet = Wallet::new();
        let consensus =
            consensus_with_funds(&[(wallet.address(), 1_000.0), ("0xval", 500.0)]);
        consensus.register_validator("0xval", 100.0).unwrap();

        let tx = signed_tx(&wallet, "0xrecipient", 50.0);
        assert!(consensus.validate_transaction(&tx).is_ok());
    }

    #[test]
    fn test_validate_rejects_unsigned() {
        let wallet = Wallet::new();
        let consensus =
            consensus_with_funds(&[(wallet.address(), 1_000.0), ("0xval", 500.0)]);
        consensus.register_validator("0xval", 100.0).unwrap();

        let tx = Transaction::new(wallet.address(), "0xrecipient", 50.0);
        assert_eq!(
            consensus.validate_transaction(&tx),
            Err(ChainError::MissingSignature)
        );
    }

    #[test]
    fn test_validate_rejects_overspend() {
        let wallet = Wallet::new();
        let consensus = consensus_with_funds(&[(wallet.address(), 10.0), ("0xval", 500.0)]);
        consensus.register_validator("0xval", 100.0).unwrap();

        let tx = signed_tx(&wallet, "0xrecipient", 50.0);
        let err = consensus.validate_transaction(&tx).unwrap_err();
        assert_eq!(err.classification(), "validation");
    }

    #[test]
    fn test_delegated_check_requires_delegates() {
        let consensus = consensus_with_funds(&[]);
        assert_eq!(
            consensus.delegated_block_check(&[]),
            Err(ChainError::NoDelegates)
        );

        consensus.register_delegate("0xholder", "0xval");
        assert_eq!(consensus.delegated_block_check(&[]), Ok(true));
    }

    #[test]
    fn test_mine_block_rewards_registered_miner() {
        let consensus = consensus_with_funds(&[]);
        consensus.register_renewable_node("0xminer", 1.0);

        let seal = consensus.mine_block("payload", "0xminer", 1, 50.0).unwrap();
        assert_eq!(seal.reward, 50.0);
        assert!(qfc_core::Block::meets_difficulty(&seal.hash, 1));
        assert_eq!(consensus.state.read().balance_of("0xminer"), 50.0);
    }

    #[test]
    fn test_mine_block_unregistered_miner_unrewarded() {
        let consensus = consensus_with_funds(&[]);
        let seal = consensus.mine_block("payload", "0xminer", 1, 50.0).unwrap();
        assert_eq!(seal.reward, 0.0);
        assert_eq!(consensus.state.read().balance_of("0xminer"), 0.0);
    }

    #[test]
    fn test_register_validator_insufficient_stake() {
        let consensus = consensus_with_funds(&[("0xval", 50.0)]);
        let err = consensus.register_validator("0xval", 100.0).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientStake { .. }));
    }
}
