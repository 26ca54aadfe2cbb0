//! CLI entry point: `bridge <config.yaml>`.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use procurement_bridge::bridge::Bridge;
use procurement_bridge::handler::{EchoHandler, HandlerRegistry};
use procurement_bridge::storage::InMemoryStorage;
use procurement_bridge::{Cli, Config, Feeder, StaticFeeder};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let storage: Arc<dyn procurement_bridge::Storage> = Arc::new(InMemoryStorage::new());
    let feeder: Arc<dyn Feeder> = Arc::new(StaticFeeder::once(Vec::new()));
    let mut registry = HandlerRegistry::new(Arc::new(EchoHandler));
    for name in &config.main.handlers {
        registry.register(name.clone(), Arc::new(EchoHandler), &config.main.handlers);
    }
    let handlers = Arc::new(registry);

    let bridge = Bridge::new(config, storage, feeder, handlers, None)
        .await
        .context("failed to build the bridge's initial client pool")?;

    bridge.run().await;
    Ok(())
}
