use std::collections::HashMap;

use log::{info, warn};
use rand::seq::IteratorRandom;

use qfc_core::Transaction;
use qfc_state::StateManager;

/// Delegated voting registry (QDPoS).
///
/// Each token holder backs exactly one validator; a later registration
/// overwrites the earlier one.
#[derive(Debug, Default)]
pub struct DelegationRegistry {
    delegates: HashMap<String, String>,
}

impl DelegationRegistry {
    pub fn new() -> Self {
        DelegationRegistry::default()
    }

    /// Record `holder` as backing `validator`, last write wins.
    pub fn register_delegate(&mut self, holder: &str, validator: &str) {
        self.delegates
            .insert(holder.to_string(), validator.to_string());
        info!("Holder {} now delegates to {}", holder, validator);
    }

    pub fn delegate_of(&self, holder: &str) -> Option<&str> {
        self.delegates.get(holder).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    /// Have a uniformly chosen delegate's backing validator vouch for the
    /// block content, delegating the per-transaction check to the state
    /// manager. Fails closed when no delegates are registered.
    pub fn validate_block(&self, transactions: &[Transaction], state: &StateManager) -> bool {
        let Some(validator) = self
            .delegates
            .values()
            .choose(&mut rand::thread_rng())
        else {
            warn!("Delegated validation failed closed: no delegates registered");
            return false;
        };

        let valid = transactions
            .iter()
            .all(|tx| state.validate_transaction(tx).is_ok());
        info!(
            "Delegate-backed validator {} vouched for block content: {}",
            validator,
            if valid { "valid" } else { "invalid" }
        );
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut registry = DelegationRegistry::new();
        registry.register_delegate("0xholder", "0xval1");
        registry.register_delegate("0xholder", "0xval2");
        assert_eq!(registry.delegate_of("0xholder"), Some("0xval2"));
    }

    #[test]
    fn test_validate_block_fails_closed_when_empty() {
        let registry = DelegationRegistry::new();
        let state = StateManager::new(1_000_000.0);
        assert!(!registry.validate_block(&[], &state));
    }

    #[test]
    fn test_validate_block_checks_balances() {
        let mut registry = DelegationRegistry::new();
        registry.register_delegate("0xholder", "0xval1");

        let mut state = StateManager::new(1_000_000.0);
        state.credit("0xrich", 1_000.0);

        let affordable = Transaction::new("0xrich", "0xother", 10.0);
        assert!(registry.validate_block(&[affordable], &state));

        let unaffordable = Transaction::new("0xbroke", "0xother", 10.0);
        assert!(!registry.validate_block(&[unaffordable], &state));
    }

    #[test]
    fn test_empty_block_is_valid_with_delegates() {
        let mut registry = DelegationRegistry::new();
        registry.register_delegate("0xholder", "0xval1");
        let state = StateManager::new(1_000_000.0);
        assert!(registry.validate_block(&[], &state));
    }
}
