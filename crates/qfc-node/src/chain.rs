use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use qfc_consensus::HybridConsensus;
use qfc_core::{Block, BlockMetadata, ChainError, Transaction};
use qfc_state::{ChainSnapshot, StateManager};

use crate::config::ChainConfig;
use crate::router::ShardRouter;
use crate::shard_set::ShardSet;

/// Snapshot write attempts per pipeline step before giving up until the
/// next tick.
const PERSIST_ATTEMPTS: u32 = 3;

/// The chain: exclusive owner of the shard set, the single state manager,
/// and the hybrid consensus engine.
///
/// One processing task runs per shard; the state manager behind its lock is
/// the only resource mutated by more than one task. Mining is offloaded to
/// a bounded blocking-worker pool shared across shards so one shard's nonce
/// search cannot starve the others.
pub struct Blockchain {
    config: ChainConfig,
    shards: Arc<ShardSet>,
    router: ShardRouter,
    state: Arc<RwLock<StateManager>>,
    consensus: Arc<HybridConsensus>,
    mining_permits: Arc<Semaphore>,
    persist_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Blockchain {
    /// Cold start: fresh genesis shards, genesis balances, and bootstrap
    /// consensus registrations.
    pub fn new(config: ChainConfig) -> Arc<Self> {
        let mut state = StateManager::new(config.total_supply);
        for (address, balance) in &config.genesis_balances {
            state.credit(address, *balance);
        }
        let shards = Arc::new(ShardSet::new(config.num_shards, config.shard_capacity));
        let chain = Self::assemble(config, shards, state);
        chain.apply_bootstrap();
        chain
    }

    /// Restore from the snapshot file if one is usable, otherwise cold
    /// start. Consensus registries are not part of the snapshot, so
    /// validators and delegates re-register after a restore; until they
    /// do, shard tasks back off on `ConsensusUnavailable`.
    pub fn load_or_cold_start(config: ChainConfig) -> Arc<Self> {
        match ChainSnapshot::load_or_cold_start(&config.state_file) {
            Some(snapshot) => {
                let (state, shards) = snapshot.into_parts();
                info!(
                    "Restored chain state from {} ({} shards)",
                    config.state_file.display(),
                    shards.len()
                );
                let shards = Arc::new(ShardSet::from_existing(shards, config.shard_capacity));
                Self::assemble(config, shards, state)
            }
            None => Self::new(config),
        }
    }

    fn assemble(config: ChainConfig, shards: Arc<ShardSet>, state: StateManager) -> Arc<Self> {
        let state = Arc::new(RwLock::new(state));
        let consensus = Arc::new(HybridConsensus::new(Arc::clone(&state)));
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Blockchain {
            router: ShardRouter::new(Arc::clone(&shards)),
            mining_permits: Arc::new(Semaphore::new(config.mining_workers.max(1))),
            config,
            shards,
            state,
            consensus,
            persist_lock: Mutex::new(()),
            shutdown_tx,
        })
    }

    fn apply_bootstrap(&self) {
        for validator in &self.config.bootstrap.validators {
            if let Err(e) = self
                .consensus
                .register_validator(&validator.address, validator.stake)
            {
                warn!(
                    "Bootstrap validator {} skipped: {}",
                    validator.address, e
                );
            }
        }
        for delegate in &self.config.bootstrap.delegates {
            self.consensus
                .register_delegate(&delegate.holder, &delegate.validator);
        }
        for node in &self.config.bootstrap.renewable_nodes {
            self.consensus
                .register_renewable_node(&node.node_id, node.renewable_ratio);
        }
    }

    pub fn consensus(&self) -> &HybridConsensus {
        &self.consensus
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.state.read().balance_of(address)
    }

    pub fn validate_all_chains(&self) -> bool {
        self.shards.validate_all()
    }

    pub fn block_height(&self, shard_id: u64) -> Result<u64, ChainError> {
        self.shards.with_shard(shard_id, |s| s.next_index())
    }

    /// Accept a signed transaction into its home shard's pending queue.
    ///
    /// Structural rejections happen here, before any queueing; balance
    /// checks happen in the shard pipeline.
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<u64, ChainError> {
        transaction.check_well_formed()?;
        if transaction.signature.is_none() {
            return Err(ChainError::MissingSignature);
        }
        let shard_id = self.router.route_transaction(&transaction.sender);
        self.shards
            .with_shard(shard_id, |s| s.push_transaction(transaction))?;
        Ok(shard_id)
    }

    /// Spawn the per-shard processing tasks and the scaling task.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for shard_id in 0..self.shards.len() as u64 {
            handles.push(tokio::spawn(Self::shard_loop(Arc::clone(&self), shard_id)));
        }
        handles.push(tokio::spawn(Self::scaling_loop(Arc::clone(&self))));
        info!(
            "Chain started: {} shards, difficulty {}",
            self.shards.len(),
            self.config.difficulty
        );
        handles
    }

    /// Request a graceful stop: every task finishes its drained batch,
    /// persists, and exits.
    ///
    /// `send_replace` updates the watch value even when no task has
    /// subscribed yet, so a shutdown requested before `start` is not lost.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    async fn scaling_loop(chain: Arc<Blockchain>) {
        let mut shutdown_rx = chain.shutdown_tx.subscribe();
        let mut ticker =
            tokio::time::interval(Duration::from_millis(chain.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Tasks spawned for scaled-out shards are joined here on shutdown,
        // so awaiting this loop's handle covers them too.
        let mut spawned = Vec::new();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
            }
            if let Some(new_id) = chain.router.maybe_scale() {
                // The new shard needs its own processing task.
                spawned.push(tokio::spawn(Self::shard_loop(Arc::clone(&chain), new_id)));
            }
        }
        for handle in spawned {
            if let Err(e) = handle.await {
                error!("Scaled-out shard task failed: {}", e);
            }
        }
    }

    async fn shard_loop(chain: Arc<Blockchain>, shard_id: u64) {
        let mut shutdown_rx = chain.shutdown_tx.subscribe();
        let mut ticker =
            tokio::time::interval(Duration::from_millis(chain.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Shard {} processing task started", shard_id);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    // Finish the batch currently queued, persist, stop.
                    if let Err(e) = chain.process_tick(shard_id).await {
                        warn!("Shard {} final batch incomplete: {}", shard_id, e.classification());
                    }
                    if let Err(e) = chain.persist_with_retry().await {
                        error!("Shard {} failed to persist on shutdown: {}", shard_id, e);
                    }
                    info!("Shard {} processing task stopped", shard_id);
                    return;
                }
            }

            match chain.process_tick(shard_id).await {
                Ok(_) => {}
                Err(e) if e.classification() == "state-corruption" => {
                    // A broken chain must not keep producing; operator
                    // intervention required.
                    error!("Shard {} halted: {}", shard_id, e);
                    return;
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "Shard {} backing off ({})",
                        shard_id,
                        e.classification()
                    );
                    tokio::time::sleep(Duration::from_millis(
                        chain.config.poll_interval_ms * 2,
                    ))
                    .await;
                }
                Err(e) => {
                    warn!("Shard {} tick failed: {}", shard_id, e.classification());
                }
            }
        }
    }

    /// One pipeline pass for a shard: drain, re-route, validate, apply,
    /// mine, append, persist. Returns whether a block was produced.
    async fn process_tick(&self, shard_id: u64) -> Result<bool, ChainError> {
        let batch = self.shards.with_shard(shard_id, |s| s.drain_pending())?;
        if batch.is_empty() {
            return Ok(false);
        }

        // Cross-shard reassignment: a transaction whose home shard changed
        // after a scaling event moves exactly once, before any local
        // processing observes it.
        let mut local = Vec::with_capacity(batch.len());
        for tx in batch {
            match self.router.reroute_target(&tx.sender, shard_id) {
                Some(target) => {
                    info!(
                        "Shard {}: transaction from {} reassigned to shard {}",
                        shard_id, tx.sender, target
                    );
                    self.shards.with_shard(target, |s| s.push_transaction(tx))?;
                }
                None => local.push(tx),
            }
        }

        // Hybrid validation in FIFO order. Validation rejections are
        // terminal; a missing validator set requeues the whole batch.
        let mut validated = Vec::with_capacity(local.len());
        let mut pending = local.into_iter();
        while let Some(tx) = pending.next() {
            match self.consensus.validate_transaction(&tx) {
                Ok(()) => validated.push(tx),
                Err(e @ ChainError::NoValidators) => {
                    let mut requeue = validated;
                    requeue.push(tx);
                    requeue.extend(pending);
                    self.shards
                        .with_shard(shard_id, |s| s.requeue_transactions(requeue))?;
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Shard {}: transaction rejected ({})",
                        shard_id,
                        e.classification()
                    );
                }
            }
        }
        if validated.is_empty() {
            return Ok(false);
        }

        // Delegated block-content check before any state mutation.
        match self.consensus.delegated_block_check(&validated) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Shard {}: delegate rejected block content; batch dropped",
                    shard_id
                );
                return Ok(false);
            }
            Err(e) => {
                self.shards
                    .with_shard(shard_id, |s| s.requeue_transactions(validated))?;
                return Err(e);
            }
        }

        // Apply under one write-lock pass, re-checking each transaction
        // against the evolving balances so that earlier transfers in the
        // batch cannot push a later one below its required balance.
        let applied: Vec<Transaction> = {
            let mut state = self.state.write();
            validated
                .into_iter()
                .filter(|tx| match state.validate_transaction(tx) {
                    Ok(()) => {
                        state.apply_transaction(tx);
                        true
                    }
                    Err(e) => {
                        warn!(
                            "Shard {}: transaction dropped at apply ({})",
                            shard_id,
                            e.classification()
                        );
                        false
                    }
                })
                .collect()
        };
        if applied.is_empty() {
            return Ok(false);
        }

        let miner = self.config.miner_address.clone();
        let mut block = self.shards.with_shard(shard_id, |s| {
            Block::new(
                s.next_index(),
                applied,
                s.latest_block().hash.clone(),
                BlockMetadata {
                    miner: Some(miner),
                    shard_id,
                },
            )
        })?;

        // Nonce search on the bounded worker pool.
        let permit = Arc::clone(&self.mining_permits)
            .acquire_owned()
            .await
            .expect("mining semaphore closed");
        let consensus = Arc::clone(&self.consensus);
        let payload = block.pow_payload();
        let miner_id = self.config.miner_address.clone();
        let difficulty = self.config.difficulty;
        let base_reward = self.config.base_reward;
        let mined = tokio::task::spawn_blocking(move || {
            let seal = consensus.mine_block(&payload, &miner_id, difficulty, base_reward);
            drop(permit);
            seal
        })
        .await
        .expect("mining worker panicked");
        let seal = match mined {
            Ok(seal) => seal,
            Err(e) => {
                // No block was produced, so the applied transfers must not
                // stand: undo them in reverse order and put the batch back
                // for the next tick.
                {
                    let mut state = self.state.write();
                    for tx in block.transactions.iter().rev() {
                        state.revert_transaction(tx);
                    }
                }
                self.shards
                    .with_shard(shard_id, |s| s.requeue_transactions(block.transactions))?;
                return Err(e);
            }
        };

        let reward = seal.reward;
        block.seal(seal.nonce, seal.hash);
        debug_assert!(block.validate());

        let index = block.index;
        self.shards.with_shard(shard_id, |s| s.append_block(block))??;
        info!(
            "Shard {}: block {} committed (reward {})",
            shard_id, index, reward
        );

        self.persist_with_retry().await?;
        Ok(true)
    }

    /// Write the snapshot, retrying with linear backoff. Persistence
    /// failures are never silently dropped: every attempt is logged and
    /// the final failure is surfaced to the caller.
    async fn persist_with_retry(&self) -> Result<(), ChainError> {
        let mut last_err = None;
        for attempt in 1..=PERSIST_ATTEMPTS {
            match self.persist() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Snapshot write attempt {}/{} failed: {}",
                        attempt, PERSIST_ATTEMPTS, e
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ChainError::Persistence("unknown".into())))
    }

    fn persist(&self) -> Result<(), ChainError> {
        let _guard = self.persist_lock.lock();
        let snapshot = {
            let state = self.state.read();
            ChainSnapshot::capture(&state, self.shards.clone_shards())
        };
        snapshot.save(&self.config.state_file)
    }
}
