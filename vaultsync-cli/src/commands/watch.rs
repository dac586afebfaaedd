//! `vaultsync watch`: auto-pull every opted-in vault until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast;

use vaultsync_core::settings::load_tree_at;
use vaultsync_sync::{auto_pull_loop, Progress, SyncError, SyncQueue, TracingProgress};

use super::{runtime, App};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between pulls; defaults to `auto_pull_interval_secs` from
    /// config.yaml.
    #[arg(long)]
    pub interval: Option<u64>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let every = self
            .interval
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or_else(|| app.config.auto_pull_interval());

        runtime()?.block_on(watch(app, every))
    }
}

async fn watch(app: App, every: Duration) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let (queue, worker) = SyncQueue::spawn(app.orchestrator.clone(), shutdown_tx.subscribe());

    let home = app.home.clone();
    let load_tree = move || load_tree_at(&home).map_err(SyncError::from);
    let progress: Arc<dyn Progress> = Arc::new(TracingProgress);
    let pulls = tokio::spawn(auto_pull_loop(
        queue,
        app.orchestrator.clone(),
        load_tree,
        every,
        progress,
        shutdown_tx.subscribe(),
    ));

    tracing::info!(interval_secs = every.as_secs(), "watching vaults");
    println!("Watching vaults every {}s. Press ctrl-c to stop.", every.as_secs());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(());

    pulls
        .await
        .context("auto-pull task panicked")?
        .context("auto-pull loop failed")?;
    worker
        .await
        .context("sync worker panicked")?
        .context("sync worker failed")?;
    Ok(())
}
