use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use qfc_core::{ChainError, Transaction};

/// Authoritative balance ledger.
///
/// Validation and application are split so the consensus layer can run
/// candidate checks without mutating shared state. All mutation goes through
/// the methods here; no other component writes balances directly. The node
/// wraps a single instance in a lock, giving every mutation a single-writer
/// discipline across shard tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateManager {
    total_supply: f64,
    balances: HashMap<String, f64>,
    reward_pool: f64,
}

impl StateManager {
    pub fn new(total_supply: f64) -> Self {
        StateManager {
            total_supply,
            balances: HashMap::new(),
            reward_pool: 0.0,
        }
    }

    pub fn total_supply(&self) -> f64 {
        self.total_supply
    }

    pub fn reward_pool(&self) -> f64 {
        self.reward_pool
    }

    /// Balances are created lazily: an unseen address holds zero.
    pub fn balance_of(&self, address: &str) -> f64 {
        self.balances.get(address).copied().unwrap_or(0.0)
    }

    /// Credit an address directly (genesis allocation, onramp boundary).
    pub fn credit(&mut self, address: &str, amount: f64) {
        *self.balances.entry(address.to_string()).or_insert(0.0) += amount;
        debug!("Credited {} with {} QFC", address, amount);
    }

    /// Read-only validity check: the sender must cover amount plus fee.
    pub fn validate_transaction(&self, transaction: &Transaction) -> Result<(), ChainError> {
        transaction.check_well_formed()?;
        let required = transaction.amount + transaction.fee;
        let available = self.balance_of(&transaction.sender);
        if available < required {
            return Err(ChainError::InsufficientBalance {
                address: transaction.sender.clone(),
                required,
                available,
            });
        }
        Ok(())
    }

    /// Apply a validated transaction to the balance map.
    ///
    /// Callers must have validated first; applying an invalid transaction is
    /// a programming error, not a recoverable condition.
    ///
    /// Both legs of the transfer carry the fee: the sender pays
    /// `amount + fee`, the recipient receives `amount - fee`, and the reward
    /// pool absorbs the difference.
    ///
    /// # Panics
    /// Panics if the transaction does not pass [`validate_transaction`](Self::validate_transaction).
    pub fn apply_transaction(&mut self, transaction: &Transaction) {
        assert!(
            self.validate_transaction(transaction).is_ok(),
            "apply_transaction called with an unvalidated transaction from {}",
            transaction.sender
        );

        *self
            .balances
            .entry(transaction.sender.clone())
            .or_insert(0.0) -= transaction.amount + transaction.fee;
        *self
            .balances
            .entry(transaction.recipient.clone())
            .or_insert(0.0) += transaction.amount - transaction.fee;
        self.reward_pool += 2.0 * transaction.fee;

        debug!(
            "Applied transfer of {} QFC from {} to {} (fee {})",
            transaction.amount, transaction.sender, transaction.recipient, transaction.fee
        );
    }

    /// Undo a previously applied transaction, restoring the pre-apply
    /// balances and reward pool.
    ///
    /// Used when the block the transaction was bound for could not be
    /// produced and the transfer goes back to the pending queue.
    pub fn revert_transaction(&mut self, transaction: &Transaction) {
        *self
            .balances
            .entry(transaction.sender.clone())
            .or_insert(0.0) += transaction.amount + transaction.fee;
        *self
            .balances
            .entry(transaction.recipient.clone())
            .or_insert(0.0) -= transaction.amount - transaction.fee;
        self.reward_pool = (self.reward_pool - 2.0 * transaction.fee).max(0.0);

        debug!(
            "Reverted transfer of {} QFC from {} to {}",
            transaction.amount, transaction.sender, transaction.recipient
        );
    }

    /// Credit a miner's reward after a successful block, drawing down the
    /// pool as far as it goes.
    pub fn reward_miner(&mut self, address: &str, amount: f64) {
        *self.balances.entry(address.to_string()).or_insert(0.0) += amount;
        self.reward_pool = (self.reward_pool - amount).max(0.0);
        info!("Miner {} rewarded with {} QFC", address, amount);
    }

    /// Lock stake out of an address's spendable balance.
    ///
    /// This is the only path by which the consensus layer may debit a
    /// balance; it never writes the map directly.
    pub fn debit_stake(&mut self, address: &str, stake: f64) -> Result<(), ChainError> {
        let available = self.balance_of(address);
        if available < stake {
            return Err(ChainError::InsufficientStake {
                address: address.to_string(),
                offered: stake,
                available,
            });
        }
        *self.balances.entry(address.to_string()).or_insert(0.0) -= stake;
        info!("Locked {} QFC of stake for {}", stake, address);
        Ok(())
    }

    pub(crate) fn balances(&self) -> &HashMap<String, f64> {
        &self.balances
    }

    pub(crate) fn from_parts(
        total_supply: f64,
        balances: HashMap<String, f64>,
        reward_pool: f64,
    ) -> Self {
        StateManager {
            total_supply,
            balances,
            reward_pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scenario_a_successful_transfer() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xsender", 1000.0);

        let tx = Transaction::new("0xsender", "0xrecipient", 50.0);
        assert_eq!(tx.fee, 0.5);
        assert!(state.validate_transaction(&tx).is_ok());

        state.apply_transaction(&tx);
        assert_eq!(state.balance_of("0xsender"), 949.5);
        assert_eq!(state.balance_of("0xrecipient"), 49.5);
        assert_eq!(state.reward_pool(), 1.0);
    }

    #[test]
    fn test_scenario_b_insufficient_funds() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xsender", 10.0);

        let tx = Transaction::new("0xsender", "0xrecipient", 50.0);
        let err = state.validate_transaction(&tx).unwrap_err();
        assert_eq!(err.classification(), "validation");

        // No balances change on a failed validation.
        assert_eq!(state.balance_of("0xsender"), 10.0);
        assert_eq!(state.balance_of("0xrecipient"), 0.0);
    }

    #[test]
    fn test_validation_is_read_only_and_idempotent() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xsender", 1000.0);
        let tx = Transaction::new("0xsender", "0xrecipient", 50.0);

        let first = state.validate_transaction(&tx);
        let second = state.validate_transaction(&tx);
        assert_eq!(first, second);
        assert_eq!(state.balance_of("0xsender"), 1000.0);
    }

    #[test]
    #[should_panic(expected = "unvalidated transaction")]
    fn test_apply_unvalidated_is_fatal() {
        let mut state = StateManager::new(1_000_000.0);
        let tx = Transaction::new("0xbroke", "0xrecipient", 50.0);
        state.apply_transaction(&tx);
    }

    #[test]
    fn test_revert_restores_balances_and_pool() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xsender", 1000.0);
        let tx = Transaction::new("0xsender", "0xrecipient", 50.0);

        state.apply_transaction(&tx);
        state.revert_transaction(&tx);

        assert_eq!(state.balance_of("0xsender"), 1000.0);
        assert_eq!(state.balance_of("0xrecipient"), 0.0);
        assert_eq!(state.reward_pool(), 0.0);

        // The reverted transfer is valid again.
        assert!(state.validate_transaction(&tx).is_ok());
    }

    #[test]
    fn test_reward_miner_draws_down_pool() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xsender", 1000.0);
        state.apply_transaction(&Transaction::new("0xsender", "0xrecipient", 100.0));
        assert_eq!(state.reward_pool(), 2.0);

        state.reward_miner("0xminer", 25.0);
        assert_eq!(state.balance_of("0xminer"), 25.0);
        assert_eq!(state.reward_pool(), 0.0);
    }

    #[test]
    fn test_debit_stake_requires_balance() {
        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xvalidator", 100.0);

        assert!(state.debit_stake("0xvalidator", 60.0).is_ok());
        assert_eq!(state.balance_of("0xvalidator"), 40.0);

        let err = state.debit_stake("0xvalidator", 60.0).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientStake { .. }));
        assert_eq!(state.balance_of("0xvalidator"), 40.0);
    }

    #[test]
    fn test_lazy_zero_balances() {
        let state = StateManager::new(1_000_000.0);
        assert_eq!(state.balance_of("0xnever-seen"), 0.0);
    }

    proptest! {
        /// Validation succeeds exactly when the sender covers amount + fee.
        #[test]
        fn prop_validate_iff_balance_covers(
            balance in 0.0f64..1_000_000.0,
            amount in 0.01f64..1_000_000.0,
        ) {
            let mut state = StateManager::new(10_000_000.0);
            state.credit("0xsender", balance);
            let tx = Transaction::new("0xsender", "0xrecipient", amount);

            let valid = state.validate_transaction(&tx).is_ok();
            prop_assert_eq!(valid, balance >= amount + tx.fee);
        }
    }
}
