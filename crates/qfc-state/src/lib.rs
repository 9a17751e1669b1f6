pub mod snapshot;
pub mod state_manager;

pub use snapshot::ChainSnapshot;
pub use state_manager::StateManager;
