use std::collections::HashMap;

use log::info;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

use qfc_core::ChainError;
use qfc_state::StateManager;

/// Stake-weighted validator registry (QPoS).
///
/// Registering locks stake out of the spendable balance through the state
/// manager's validated debit; the registry never touches balances directly.
/// Invariant: the sum of recorded stakes equals `total_staked`.
#[derive(Debug, Default)]
pub struct StakeRegistry {
    stakes: HashMap<String, f64>,
    total_staked: f64,
}

impl StakeRegistry {
    pub fn new() -> Self {
        StakeRegistry::default()
    }

    /// Lock `stake` from `address` and record the validator.
    ///
    /// Repeat registrations add to the existing stake.
    pub fn register_validator(
        &mut self,
        state: &mut StateManager,
        address: &str,
        stake: f64,
    ) -> Result<(), ChainError> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(ChainError::MalformedTransaction(
                "stake must be a positive finite number".into(),
            ));
        }
        state.debit_stake(address, stake)?;
        *self.stakes.entry(address.to_string()).or_insert(0.0) += stake;
        self.total_staked += stake;
        info!("Validator {} registered with stake {}", address, stake);
        Ok(())
    }

    /// Weighted-random choice over registered validators, weight = stake.
    ///
    /// An empty registry is a hard validation failure for the caller, not
    /// something to retry in a loop.
    pub fn select_validator(&self) -> Result<String, ChainError> {
        if self.stakes.is_empty() {
            return Err(ChainError::NoValidators);
        }
        let (addresses, weights): (Vec<&String>, Vec<f64>) = self
            .stakes
            .iter()
            .map(|(address, stake)| (address, *stake))
            .unzip();
        let dist = WeightedIndex::new(&weights).map_err(|_| ChainError::NoValidators)?;
        let selected = addresses[dist.sample(&mut thread_rng())].clone();
        Ok(selected)
    }

    pub fn stake_of(&self, address: &str) -> f64 {
        self.stakes.get(address).copied().unwrap_or(0.0)
    }

    pub fn total_staked(&self) -> f64 {
        self.total_staked
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }
}
