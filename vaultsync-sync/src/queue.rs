//! Serial sync queue and the auto-pull loop.
//!
//! Every sync action in the process goes through one [`SyncQueue`]: a single
//! worker task drains an `mpsc` channel and runs each job to completion on
//! the blocking pool before taking the next, so no two git operations ever
//! overlap. Callers await the outcome through a `oneshot`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use vaultsync_core::{VaultId, VaultTree};

use crate::error::SyncError;
use crate::orchestrator::SyncOrchestrator;
use crate::progress::Progress;
use crate::state::RepositoryAction;

const QUEUE_DEPTH: usize = 64;

struct SyncJob {
    tree: Arc<VaultTree>,
    vault: VaultId,
    work: Work,
    progress: Arc<dyn Progress>,
    respond_to: oneshot::Sender<Result<SyncOutcome, SyncError>>,
}

enum Work {
    /// `None` lets the worker decide from the vault's current state.
    Action(Option<RepositoryAction>),
    /// Commit with this message, then pull and push when an origin is set.
    Revision(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub vault: String,
    pub action: RepositoryAction,
    pub duration_ms: u128,
}

/// Handle for submitting work to the queue. Cheap to clone.
#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<SyncJob>,
}

impl SyncQueue {
    /// Start the worker. It stops when `shutdown` fires or every handle is
    /// dropped.
    pub fn spawn(
        orchestrator: Arc<SyncOrchestrator>,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<Result<(), SyncError>>) {
        let (tx, rx) = mpsc::channel::<SyncJob>(QUEUE_DEPTH);
        let handle = tokio::spawn(worker(orchestrator, rx, shutdown));
        (Self { tx }, handle)
    }

    /// Queue `action` (or the action the vault currently needs) and wait for
    /// it to finish.
    pub async fn submit(
        &self,
        tree: Arc<VaultTree>,
        vault: VaultId,
        action: Option<RepositoryAction>,
        progress: Arc<dyn Progress>,
    ) -> Result<SyncOutcome, SyncError> {
        self.enqueue(tree, vault, Work::Action(action), progress).await
    }

    /// Queue a commit with `message`. The outcome's action is
    /// [`RepositoryAction::PullPush`] when the vault has an origin and
    /// [`RepositoryAction::Commit`] otherwise.
    pub async fn submit_revision(
        &self,
        tree: Arc<VaultTree>,
        vault: VaultId,
        message: impl Into<String>,
        progress: Arc<dyn Progress>,
    ) -> Result<SyncOutcome, SyncError> {
        self.enqueue(tree, vault, Work::Revision(message.into()), progress)
            .await
    }

    async fn enqueue(
        &self,
        tree: Arc<VaultTree>,
        vault: VaultId,
        work: Work,
        progress: Arc<dyn Progress>,
    ) -> Result<SyncOutcome, SyncError> {
        let (respond_to, response) = oneshot::channel();
        let job = SyncJob {
            tree,
            vault,
            work,
            progress,
            respond_to,
        };
        self.tx
            .send(job)
            .await
            .map_err(|_| SyncError::ChannelClosed("sync queue"))?;
        response
            .await
            .map_err(|_| SyncError::ChannelClosed("sync response"))?
    }
}

async fn worker(
    orchestrator: Arc<SyncOrchestrator>,
    mut rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = rx.recv() => {
                let Some(job) = maybe_job else { break };
                let orchestrator = orchestrator.clone();
                let tree = job.tree;
                let vault = job.vault;
                let work = job.work;
                let progress = job.progress;

                let outcome = tokio::task::spawn_blocking(move || {
                    run_job(&orchestrator, &tree, vault, work, progress.as_ref())
                })
                .await
                .unwrap_or_else(|err| Err(SyncError::Worker(format!("sync task join error: {err}"))));

                if let Err(err) = &outcome {
                    tracing::warn!(error = %err, "sync job failed");
                }
                let _ = job.respond_to.send(outcome);
            }
        }
    }
    tracing::debug!("sync queue worker stopped");
    Ok(())
}

fn run_job(
    orchestrator: &SyncOrchestrator,
    tree: &VaultTree,
    vault: VaultId,
    work: Work,
    progress: &dyn Progress,
) -> Result<SyncOutcome, SyncError> {
    let started = Instant::now();
    let action = match work {
        Work::Action(action) => {
            let action = match action {
                Some(action) => action,
                None => orchestrator.repository_state(tree, vault)?,
            };
            orchestrator.check_remote_auth(tree, vault, action)?;
            orchestrator.run(action, tree, vault, progress)?;
            action
        }
        Work::Revision(message) => {
            let action = match orchestrator.resolve_origin(tree, vault)? {
                Some(_) => RepositoryAction::PullPush,
                None => RepositoryAction::Commit,
            };
            orchestrator.check_remote_auth(tree, vault, action)?;
            orchestrator.save_revision(tree, vault, &message, progress)?;
            action
        }
    };

    Ok(SyncOutcome {
        vault: tree.get(vault).map(|v| v.label.clone()).unwrap_or_default(),
        action,
        duration_ms: started.elapsed().as_millis(),
    })
}

/// Vaults that opted into auto-pull and have both a repository and an origin.
pub fn auto_pull_targets(orchestrator: &SyncOrchestrator, tree: &VaultTree) -> Vec<VaultId> {
    tree.iter()
        .filter(|(id, vault)| {
            let enabled = orchestrator
                .settings()
                .load_settings(&vault.key)
                .map(|s| s.auto_pull)
                .unwrap_or(false);
            enabled
                && orchestrator.has_repository(tree, *id).unwrap_or(false)
                && matches!(orchestrator.resolve_origin(tree, *id), Ok(Some(_)))
        })
        .map(|(id, _)| id)
        .collect()
}

/// Submit `pullPush` for every auto-pull vault on each tick until shutdown.
///
/// `load_tree` is called once per tick so newly registered vaults are picked
/// up without a restart.
pub async fn auto_pull_loop<F>(
    queue: SyncQueue,
    orchestrator: Arc<SyncOrchestrator>,
    load_tree: F,
    every: Duration,
    progress: Arc<dyn Progress>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError>
where
    F: Fn() -> Result<VaultTree, SyncError> + Send + Sync + 'static,
{
    let load_tree = Arc::new(load_tree);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let orchestrator_for_scan = orchestrator.clone();
                let load = load_tree.clone();
                let scanned = tokio::task::spawn_blocking(move || {
                    let tree = load()?;
                    let targets = auto_pull_targets(&orchestrator_for_scan, &tree);
                    Ok::<_, SyncError>((Arc::new(tree), targets))
                })
                .await
                .map_err(|err| SyncError::Worker(format!("auto-pull scan join error: {err}")))?;

                let (tree, targets) = match scanned {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::warn!(error = %err, "auto-pull scan failed");
                        continue;
                    }
                };

                for id in targets {
                    let outcome = queue
                        .submit(tree.clone(), id, Some(RepositoryAction::PullPush), progress.clone())
                        .await;
                    match outcome {
                        Ok(done) => tracing::info!(
                            vault = %done.vault,
                            duration_ms = done.duration_ms,
                            "auto-pull completed",
                        ),
                        Err(SyncError::ChannelClosed(what)) => {
                            tracing::debug!(channel = what, "sync queue closed, stopping auto-pull");
                            return Ok(());
                        }
                        Err(err) => tracing::warn!(error = %err, "auto-pull failed"),
                    }
                }
            }
        }
    }

    Ok(())
}
