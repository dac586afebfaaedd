//! `vaultsync sync`: run the action a vault needs right now.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::{broadcast, mpsc};

use vaultsync_core::{VaultId, VaultTree};
use vaultsync_sync::{
    ChannelProgress, GitError, Progress, RepositoryAction, SyncError, SyncQueue,
};

use super::{runtime, App};

/// Arguments for `vaultsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Vault label or settings key prefix.
    pub vault: String,

    /// Commit with this message, then pull and push when an origin is set.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let label = tree.get(id).map(|v| v.label.clone()).unwrap_or_default();

        let revision = self.message.is_some();
        let result = runtime()?.block_on(sync_via_queue(&app, tree, id, self.message));

        match result {
            Ok(_) if revision => {
                println!("✓ '{label}' revision saved");
                Ok(())
            }
            Ok(action) => {
                println!("✓ '{label}' {}", action.label());
                Ok(())
            }
            Err(SyncError::Git(GitError::NoAddedFiles)) => {
                println!("✓ '{label}' nothing new to commit");
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("sync failed for '{label}'")),
        }
    }
}

/// Run through the serial queue, echoing progress lines as they arrive.
///
/// With a `message` the job saves a named revision; otherwise the worker
/// decides the action from the vault's state.
async fn sync_via_queue(
    app: &App,
    tree: VaultTree,
    id: VaultId,
    message: Option<String>,
) -> Result<RepositoryAction, SyncError> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let (queue, worker) = SyncQueue::spawn(app.orchestrator.clone(), shutdown_rx);

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            println!("  {} {line}", "·".bright_black());
        }
    });

    let progress: Arc<dyn Progress> = Arc::new(ChannelProgress::new(line_tx));
    let tree = Arc::new(tree);
    let outcome = match message {
        Some(message) => queue.submit_revision(tree, id, message, progress).await,
        None => queue.submit(tree, id, None, progress).await,
    };

    let _ = shutdown_tx.send(());
    drop(queue);
    worker
        .await
        .map_err(|err| SyncError::Worker(format!("sync worker join error: {err}")))??;
    // The last progress sender went away with the finished job.
    let _ = printer.await;

    let outcome = outcome?;
    tracing::info!(vault = %outcome.vault, duration_ms = outcome.duration_ms, "sync finished");
    Ok(outcome.action)
}
