use std::collections::HashMap;

use log::info;

/// Renewable-energy reward adjustment (GPoW).
///
/// Each node reports the fraction of its energy drawn from renewable
/// sources. Rewards scale linearly from half the base reward (ratio 0) to
/// the full base reward (ratio 1).
#[derive(Debug, Default)]
pub struct RenewableRegistry {
    ratios: HashMap<String, f64>,
}

impl RenewableRegistry {
    pub fn new() -> Self {
        RenewableRegistry::default()
    }

    /// Record a node's renewable ratio, clamped into [0, 1].
    pub fn register_node(&mut self, node_id: &str, renewable_ratio: f64) {
        let ratio = renewable_ratio.clamp(0.0, 1.0);
        self.ratios.insert(node_id.to_string(), ratio);
        info!("Node {} registered with renewable ratio {}", node_id, ratio);
    }

    pub fn ratio_of(&self, node_id: &str) -> Option<f64> {
        self.ratios.get(node_id).copied()
    }

    /// Adjusted reward for every registered node. Pure function of the
    /// registry snapshot.
    pub fn adjust_rewards(&self, base_reward: f64) -> HashMap<String, f64> {
        self.ratios
            .iter()
            .map(|(node_id, ratio)| (node_id.clone(), base_reward * (0.5 + 0.5 * ratio)))
            .collect()
    }

    /// Adjusted reward for one node; unregistered nodes earn nothing.
    pub fn adjusted_reward(&self, node_id: &str, base_reward: f64) -> f64 {
        self.ratios
            .get(node_id)
            .map(|ratio| base_reward * (0.5 + 0.5 * ratio))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_d_reward_scaling() {
        let mut registry = RenewableRegistry::new();
        registry.register_node("coal", 0.0);
        registry.register_node("solar", 1.0);

        assert_eq!(registry.adjusted_reward("coal", 50.0), 25.0);
        assert_eq!(registry.adjusted_reward("solar", 50.0), 50.0);
    }

    #[test]
    fn test_unregistered_node_earns_nothing() {
        let registry = RenewableRegistry::new();
        assert_eq!(registry.adjusted_reward("ghost", 50.0), 0.0);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let mut registry = RenewableRegistry::new();
        registry.register_node("over", 1.5);
        registry.register_node("under", -0.3);
        assert_eq!(registry.ratio_of("over"), Some(1.0));
        assert_eq!(registry.ratio_of("under"), Some(0.0));
    }

    #[test]
    fn test_adjust_rewards_covers_all_nodes() {
        let mut registry = RenewableRegistry::new();
        registry.register_node("a", 0.5);
        registry.register_node("b", 0.0);

        let rewards = registry.adjust_rewards(100.0);
        assert_eq!(rewards.len(), 2);
        assert_eq!(rewards["a"], 75.0);
        assert_eq!(rewards["b"], 50.0);
    }
}
