use anyhow::{Context, Result};
use clap::Parser;
use cfgbroker::{CapabilityManifest, ConfigBroker};
use cfgbroker_demo::config::AppConfig;
use cfgbroker_demo::params::Params;
use cfgbroker_demo::runtime;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();

    tracing_subscriber::fmt()
        .with_max_level(params.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .init();

    let config = AppConfig::load_or_default(params.config.as_ref())?;
    let manifest = CapabilityManifest::load(&params.manifest)
        .with_context(|| format!("loading manifest {:?}", params.manifest))?;
    info!(capabilities = manifest.capabilities.len(), "manifest loaded");

    let (broker, tokens) = ConfigBroker::boot(config.broker.clone(), &manifest)
        .context("issuing capabilities")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    let running = runtime::run(broker.clone(), tokens, &config.demo, shutdown_rx)?;

    match config.demo.run_for() {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                _ = tokio::time::sleep(limit) => info!(?limit, "run time elapsed"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            info!("interrupted");
        }
    }

    shutdown_tx.send(()).context("broadcasting shutdown")?;
    for handle in running.handles {
        if let Err(e) = handle.await {
            tracing::error!("compartment task failed: {:?}", e);
        }
    }

    let stats = broker.stats().await;
    info!(
        items = stats.items,
        subscriptions = stats.subscriptions,
        retained_bytes = stats.retained_bytes,
        "broker stopped"
    );
    for sub in &running.subscribers {
        info!(subscriber = %sub.name(), accepted = sub.accepted(), rejected = sub.rejected(), "final tally");
    }
    Ok(())
}
