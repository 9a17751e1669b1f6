use std::path::Path;

use anyhow::Result;
use log::info;

use qfc_node::{Blockchain, ChainConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ChainConfig::load(Path::new(&path)),
        None => ChainConfig::default(),
    };

    let chain = Blockchain::load_or_cold_start(config);
    let handles = chain.clone().start();
    info!("QFC node running with {} shards", chain.shard_count());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested; draining shard tasks");
    chain.shutdown();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
