use std::path::Path;

use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository};

use vaultsync_sync::{AuthenticationHandler, GitEngine, GitError, GitRepository};

use crate::credentials::remote_callbacks;
use crate::error::GitResultExt;
use crate::repository::Git2Repository;

/// [`GitEngine`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Engine;

impl Git2Engine {
    pub fn new() -> Self {
        Self
    }
}

impl GitEngine for Git2Engine {
    fn open(&self, git_dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        let repo = Repository::open(git_dir).git()?;
        Ok(Box::new(Git2Repository::new(repo, git_dir.to_path_buf())))
    }

    fn init(&self, dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        let repo = Repository::init(dir).git()?;
        tracing::debug!(dir = %dir.display(), "initialized repository");
        Ok(Box::new(Git2Repository::new(repo, dir.join(".git"))))
    }

    /// An empty remote clones into a repository with an unborn HEAD and no
    /// local branch.
    fn clone_repo(
        &self,
        origin: &str,
        dir: &Path,
        auth: Option<&AuthenticationHandler>,
    ) -> Result<Box<dyn GitRepository>, GitError> {
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks(auth));

        let repo = RepoBuilder::new().fetch_options(fetch).clone(origin, dir).git()?;
        tracing::debug!(dir = %dir.display(), "cloned repository");
        Ok(Box::new(Git2Repository::new(repo, dir.join(".git"))))
    }
}
