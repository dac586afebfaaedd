//! Git engine capability.
//!
//! The orchestrator never touches git objects itself. Everything goes
//! through [`GitEngine`] (open/init/clone) and the [`GitRepository`] handles
//! it returns.

use std::path::{Path, PathBuf};

use crate::auth::AuthenticationHandler;
use crate::error::GitError;

/// Author/committer identity for commits and merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// How a file changed in one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One file touched by a commit, with blob text on both sides when it is
/// valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old_text: Option<String>,
    pub new_text: Option<String>,
}

/// A commit and the files it changed relative to its first parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitChanges {
    pub id: String,
    pub changes: Vec<FileChange>,
}

pub trait GitEngine: Send + Sync {
    /// Open the repository whose metadata lives at `git_dir`.
    fn open(&self, git_dir: &Path) -> Result<Box<dyn GitRepository>, GitError>;

    /// Create a fresh repository in `dir` (metadata at `dir/.git`).
    fn init(&self, dir: &Path) -> Result<Box<dyn GitRepository>, GitError>;

    /// Clone `origin` into `dir` (metadata at `dir/.git`).
    fn clone_repo(
        &self,
        origin: &str,
        dir: &Path,
        auth: Option<&AuthenticationHandler>,
    ) -> Result<Box<dyn GitRepository>, GitError>;
}

pub trait GitRepository: Send {
    /// Location of the repository metadata.
    fn git_dir(&self) -> PathBuf;

    fn set_work_tree(&mut self, path: &Path) -> Result<(), GitError>;

    /// Id of the commit HEAD points at; `None` before the first commit.
    fn head_commit(&self) -> Result<Option<String>, GitError>;

    /// Stage every change in the work tree. Returns whether the index now
    /// differs from HEAD.
    fn add_all(&mut self) -> Result<bool, GitError>;

    /// Commit the index. Returns the new commit id.
    fn commit(&mut self, message: &str, signature: &Signature) -> Result<String, GitError>;

    /// Whether the work tree matches HEAD.
    fn is_clean(&self) -> Result<bool, GitError>;

    /// Short names of local branches.
    fn local_branches(&self) -> Result<Vec<String>, GitError>;

    fn remote_names(&self) -> Result<Vec<String>, GitError>;

    fn remote_url(&self, name: &str) -> Result<Option<String>, GitError>;

    /// Add `origin` pointing at `url`; a no-op when it already exists.
    fn add_origin(&mut self, url: &str) -> Result<(), GitError>;

    fn push(&mut self, branch: &str, auth: Option<&AuthenticationHandler>)
        -> Result<(), GitError>;

    /// Fetch from origin and merge into the current branch.
    fn pull(
        &mut self,
        signature: &Signature,
        auth: Option<&AuthenticationHandler>,
    ) -> Result<(), GitError>;

    fn checkout(&mut self, branch: &str, force: bool) -> Result<(), GitError>;

    /// Every commit reachable from HEAD with its file-level changes.
    fn history(&self) -> Result<Vec<CommitChanges>, GitError>;
}
