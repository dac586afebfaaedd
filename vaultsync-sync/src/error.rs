//! Error types for vaultsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use vaultsync_core::CoreError;

/// Typed failures reported by a git engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    /// A reference (branch, remote tracking ref) does not exist.
    #[error("{0} not found")]
    RefNotFound(String),

    /// Incoming history would overwrite local, uncommitted changes.
    #[error("uncommitted changes conflict with incoming history")]
    UncommittedConflict,

    /// Nothing new was staged and a previous commit exists.
    #[error("no added files")]
    NoAddedFiles,

    /// Any other engine failure.
    #[error("{message} - {description}")]
    Engine {
        message: String,
        code: i32,
        description: String,
    },
}

impl GitError {
    pub fn engine(message: impl Into<String>, code: i32, description: impl Into<String>) -> Self {
        GitError::Engine {
            message: message.into(),
            code,
            description: description.into(),
        }
    }
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("settings error: {0}")]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Commit cache JSON error.
    #[error("commit cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The action needs a remote but no origin could be resolved.
    #[error("no origin configured for vault '{vault}'")]
    MissingOrigin { vault: String },

    /// An `https://` remote needs an OAuth token before the action may run.
    #[error("OAuth required: authorize before remote operations on '{vault}'")]
    OAuthRequired { vault: String },

    #[error("vault {0:?} is not part of the tree")]
    UnknownVault(vaultsync_core::VaultId),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("sync worker failed: {0}")]
    Worker(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
