//! # vaultsync-sync
//!
//! Per-vault git synchronization.
//!
//! [`SyncOrchestrator`] decides and executes the [`RepositoryAction`] a vault
//! needs (init, commit, clone, pull/push) through the [`GitEngine`] capability.
//! [`SyncQueue`] serializes every action in the process onto one worker.

pub mod auth;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod git_config;
pub mod history_cache;
pub mod locator;
pub mod orchestrator;
pub mod origin;
pub mod progress;
pub mod queue;
pub mod state;

#[cfg(test)]
mod fake;

pub use auth::AuthenticationHandler;
pub use diagnostics::diagnostics_summary;
pub use engine::{ChangeKind, CommitChanges, FileChange, GitEngine, GitRepository, Signature};
pub use error::{GitError, SyncError};
pub use history_cache::{CommitsCache, DiffSummary, HistoryCache};
pub use locator::{RepositoryLocator, SandboxScope, Unsandboxed};
pub use orchestrator::SyncOrchestrator;
pub use origin::OriginResolver;
pub use progress::{ChannelProgress, Progress, TracingProgress};
pub use queue::{auto_pull_loop, auto_pull_targets, SyncOutcome, SyncQueue};
pub use state::RepositoryAction;
