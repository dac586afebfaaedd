//! Executes repository actions against the git engine.
//!
//! `pullPush` sequencing:
//!
//! ```text
//! commit (NoAddedFiles ignored) ─► pull ─► push
//!                                   │
//!                       UncommittedConflict
//!                                   ▼
//!                     forced commit ─► pull again
//! ```
//!
//! A `RefNotFound` anywhere in that sequence falls through to a single push.
//! Push runs exactly once per `pullPush`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vaultsync_core::config::{keys_dir_at, AppConfig};
use vaultsync_core::credentials::is_oauth_authorized;
use vaultsync_core::{SecretStore, SettingsStore, Vault, VaultId, VaultTree};

use crate::auth::{self, AuthenticationHandler};
use crate::engine::{GitEngine, GitRepository, Signature};
use crate::error::{io_err, GitError, SyncError};
use crate::history_cache::{CommitsCache, HistoryCache};
use crate::locator::RepositoryLocator;
use crate::origin::OriginResolver;
use crate::progress::Progress;
use crate::state::RepositoryAction;

pub const INIT_COMMIT_MESSAGE: &str = "FSNotes Init";
pub const USUAL_COMMIT_MESSAGE: &str = "Usual commit";

/// The ref a clone of an empty remote reports as missing.
pub const EMPTY_REMOTE_REF: &str = "refs/heads/master";

pub struct SyncOrchestrator {
    engine: Arc<dyn GitEngine>,
    settings: Arc<dyn SettingsStore>,
    secrets: Arc<dyn SecretStore>,
    locator: RepositoryLocator,
    history: HistoryCache,
    signature: Signature,
    keys_dir: PathBuf,
}

impl SyncOrchestrator {
    pub fn new(
        engine: Arc<dyn GitEngine>,
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
        locator: RepositoryLocator,
        history: HistoryCache,
        keys_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            settings,
            secrets,
            locator,
            history,
            signature: Signature::new(
                vaultsync_core::config::DEFAULT_SIGNATURE_NAME,
                vaultsync_core::config::DEFAULT_SIGNATURE_EMAIL,
            ),
            keys_dir: keys_dir.into(),
        }
    }

    /// Wire everything from `config.yaml` under `home`.
    pub fn from_config(
        home: &Path,
        config: &AppConfig,
        engine: Arc<dyn GitEngine>,
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self::new(
            engine,
            settings,
            secrets,
            RepositoryLocator::from_config(config, home),
            HistoryCache::new(config.cache_dir_at(home)),
            keys_dir_at(home),
        )
        .with_signature(Signature::new(&config.signature_name, &config.signature_email))
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn locator(&self) -> &RepositoryLocator {
        &self.locator
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn engine(&self) -> &dyn GitEngine {
        self.engine.as_ref()
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    // -----------------------------------------------------------------------
    // 1. State
    // -----------------------------------------------------------------------

    pub fn resolve_origin(&self, tree: &VaultTree, id: VaultId) -> Result<Option<String>, SyncError> {
        self.origin_resolver().resolve_origin(tree, id)
    }

    pub fn has_repository(&self, tree: &VaultTree, id: VaultId) -> Result<bool, SyncError> {
        Ok(self.locator.exists(vault(tree, id)?))
    }

    /// Action the vault needs right now.
    pub fn repository_state(&self, tree: &VaultTree, id: VaultId) -> Result<RepositoryAction, SyncError> {
        let has_repository = self.has_repository(tree, id)?;
        let has_origin = self.resolve_origin(tree, id)?.is_some();
        Ok(RepositoryAction::decide(has_repository, has_origin))
    }

    /// Nearest vault (itself first, then ancestors) that has a repository.
    pub fn repository_owner(&self, tree: &VaultTree, id: VaultId) -> Option<VaultId> {
        std::iter::once(id)
            .chain(tree.ancestors(id))
            .find(|candidate| tree.get(*candidate).is_some_and(|v| self.locator.exists(v)))
    }

    /// Refuse remote actions against an `https://` origin until OAuth is
    /// authorized.
    pub fn check_remote_auth(
        &self,
        tree: &VaultTree,
        id: VaultId,
        action: RepositoryAction,
    ) -> Result<(), SyncError> {
        if !action.needs_remote() {
            return Ok(());
        }
        let vault = vault(tree, id)?;
        let Some(origin) = self.resolve_origin(tree, id)? else {
            return Ok(());
        };
        if !origin.to_lowercase().starts_with("https://") {
            return Ok(());
        }
        if is_oauth_authorized(self.settings.as_ref(), self.secrets.as_ref(), &vault.key)? {
            return Ok(());
        }
        Err(SyncError::OAuthRequired {
            vault: vault.label.clone(),
        })
    }

    /// Commit-diff cache of the vault's repository owner.
    pub fn commit_history(&self, tree: &VaultTree, id: VaultId) -> Result<CommitsCache, SyncError> {
        let owner = self.repository_owner(tree, id).unwrap_or(id);
        self.history.load(&vault(tree, owner)?.key)
    }

    // -----------------------------------------------------------------------
    // 2. Actions
    // -----------------------------------------------------------------------

    /// Run `action` and report the failure, if any, as a user-facing message.
    pub fn execute(
        &self,
        action: RepositoryAction,
        tree: &VaultTree,
        id: VaultId,
        progress: &dyn Progress,
    ) -> Option<String> {
        self.run(action, tree, id, progress)
            .err()
            .map(|err| err.to_string())
    }

    pub fn run(
        &self,
        action: RepositoryAction,
        tree: &VaultTree,
        id: VaultId,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let vault = vault(tree, id)?;
        tracing::info!(vault = %vault.label, action = %action, "running repository action");

        match action {
            RepositoryAction::InitCommit => {
                self.init_repository(vault)?;
                self.commit(vault, None, progress)
            }
            RepositoryAction::Commit => self.commit(vault, None, progress),
            RepositoryAction::ClonePush => {
                self.history.invalidate(&vault.key)?;
                let origin = self.require_origin(tree, id)?;
                let auth = self.auth_for(vault)?;
                self.clone_push(vault, &origin, auth.as_ref(), progress)
            }
            RepositoryAction::PullPush => {
                let origin = self.require_origin(tree, id)?;
                let auth = self.auth_for(vault)?;
                self.pull_push(vault, &origin, auth.as_ref(), progress)
            }
        }
    }

    /// Commit with an explicit message, then pull and push when an origin is
    /// configured.
    pub fn save_revision(
        &self,
        tree: &VaultTree,
        id: VaultId,
        message: &str,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let vault = vault(tree, id)?;
        self.commit(vault, Some(message), progress)?;

        let Some(origin) = self.resolve_origin(tree, id)? else {
            return Ok(());
        };
        let auth = self.auth_for(vault)?;
        self.pull(vault, &origin, auth.as_ref(), progress)?;
        self.push(vault, &origin, auth.as_ref(), progress)
    }

    /// Delete the repository at the primary location and its commit cache.
    pub fn remove_repository(
        &self,
        tree: &VaultTree,
        id: VaultId,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let vault = vault(tree, id)?;
        let repo = self.locator.primary_location(vault);
        if repo.is_dir() {
            std::fs::remove_dir_all(&repo).map_err(|e| io_err(&repo, e))?;
        } else if repo.exists() {
            std::fs::remove_file(&repo).map_err(|e| io_err(&repo, e))?;
        }
        self.history.invalidate(&vault.key)?;
        progress.log("git repository has been deleted");
        Ok(())
    }

    fn pull_push(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let outcome = match self.commit(vault, None, progress) {
            Ok(()) | Err(SyncError::Git(GitError::NoAddedFiles)) => {
                self.pull(vault, origin, auth, progress)
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => self.push(vault, origin, auth, progress),
            Err(SyncError::Git(GitError::RefNotFound(reference))) => {
                progress.log(&format!("{reference} not found, push trying ..."));
                self.push(vault, origin, auth, progress)
            }
            Err(err) => Err(err),
        }
    }

    fn clone_push(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        match self.clone_repository(vault, origin, auth) {
            Ok(mut repo) => match first_local_branch(repo.as_ref())? {
                Some(branch) => {
                    repo.checkout(&branch, true)?;
                    progress.log(&format!("{} - successful clone", vault.label));
                    self.cache_history(vault, repo.as_ref(), progress);
                    Ok(())
                }
                None => self.publish_to_empty_remote(vault, origin, auth, progress),
            },
            Err(SyncError::Git(GitError::RefNotFound(reference)))
                if reference == EMPTY_REMOTE_REF =>
            {
                progress.log("remote is empty, pushing local history");
                self.publish_to_empty_remote(vault, origin, auth, progress)
            }
            Err(err) => Err(err),
        }
    }

    /// Empty remote: create the local repository when needed, commit, push.
    fn publish_to_empty_remote(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        if !self.locator.exists(vault) {
            self.init_repository(vault)?;
        }
        match self.commit(vault, None, progress) {
            Ok(()) | Err(SyncError::Git(GitError::NoAddedFiles)) => {}
            Err(err) => return Err(err),
        }
        self.push(vault, origin, auth, progress)
    }

    // -----------------------------------------------------------------------
    // 3. Steps
    // -----------------------------------------------------------------------

    fn commit(
        &self,
        vault: &Vault,
        message: Option<&str>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        self.commit_inner(vault, message, false, progress)
    }

    fn commit_inner(
        &self,
        vault: &Vault,
        message: Option<&str>,
        force: bool,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let mut repo = self.open_repository(vault)?;
        let last = repo.head_commit()?;

        progress.log("git add .");
        let staged = repo.add_all()?;
        if !staged && last.is_some() && !force {
            progress.log("git add: no new data");
            return Err(GitError::NoAddedFiles.into());
        }

        progress.log("git commit");
        let message = message.unwrap_or(if last.is_none() {
            INIT_COMMIT_MESSAGE
        } else {
            USUAL_COMMIT_MESSAGE
        });
        let id = repo.commit(message, &self.signature)?;
        tracing::debug!(vault = %vault.label, commit = %id, "committed");
        progress.log("git commit done");

        self.cache_history(vault, repo.as_ref(), progress);
        Ok(())
    }

    fn pull(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let mut repo = self.open_repository(vault)?;
        repo.add_origin(origin)?;

        match repo.pull(&self.signature, auth) {
            Ok(()) => {}
            Err(GitError::UncommittedConflict) => {
                progress.log("local changes conflict with incoming history, committing first");
                self.commit_inner(vault, None, true, progress)?;
                repo.pull(&self.signature, auth)?;
            }
            Err(err) => return Err(err.into()),
        }

        progress.log(&format!("{} - successful git pull", vault.label));
        Ok(())
    }

    fn push(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
        progress: &dyn Progress,
    ) -> Result<(), SyncError> {
        let mut repo = self.open_repository(vault)?;
        repo.add_origin(origin)?;

        let Some(branch) = first_local_branch(repo.as_ref())? else {
            tracing::warn!(vault = %vault.label, "no local branch to push");
            return Ok(());
        };
        repo.push(&branch, auth)?;
        progress.log(&format!("{} - successful push", vault.label));
        Ok(())
    }

    /// Create an empty repository in the staging directory and move its
    /// metadata to the primary location.
    fn init_repository(&self, vault: &Vault) -> Result<(), SyncError> {
        let staging = self.prepare_staging(vault)?;
        let mut repo = self.engine.init(&staging)?;
        if self.locator.uses_work_tree() {
            repo.set_work_tree(&vault.path)?;
        }
        drop(repo);

        self.move_into_place(vault, &staging)?;
        tracing::info!(vault = %vault.label, "initialized repository");
        Ok(())
    }

    /// Clone into the staging directory, move the metadata into place and
    /// reopen it there.
    fn clone_repository(
        &self,
        vault: &Vault,
        origin: &str,
        auth: Option<&AuthenticationHandler>,
    ) -> Result<Box<dyn GitRepository>, SyncError> {
        let staging = self.prepare_staging(vault)?;
        let cloned = self.engine.clone_repo(origin, &staging, auth);
        let mut repo = match cloned {
            Ok(repo) => repo,
            Err(err) => {
                remove_dir_if_present(&staging)?;
                return Err(err.into());
            }
        };
        if self.locator.uses_work_tree() {
            repo.set_work_tree(&vault.path)?;
        }
        drop(repo);

        let primary = self.move_into_place(vault, &staging)?;
        let mut repo = self.engine.open(&primary)?;
        if self.locator.uses_work_tree() {
            repo.set_work_tree(&vault.path)?;
        }
        Ok(repo)
    }

    fn prepare_staging(&self, vault: &Vault) -> Result<PathBuf, SyncError> {
        let staging = self.locator.staging_dir(vault);
        remove_dir_if_present(&staging)?;
        std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        Ok(staging)
    }

    fn move_into_place(&self, vault: &Vault, staging: &Path) -> Result<PathBuf, SyncError> {
        let primary = self.locator.primary_location(vault);
        if let Some(parent) = primary.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let dot_git = staging.join(".git");
        std::fs::rename(&dot_git, &primary).map_err(|e| io_err(&primary, e))?;
        remove_dir_if_present(staging)?;
        Ok(primary)
    }

    fn open_repository(&self, vault: &Vault) -> Result<Box<dyn GitRepository>, SyncError> {
        let mut repo = self.locator.open(self.engine.as_ref(), vault)?;
        if self.locator.uses_work_tree() {
            repo.set_work_tree(&vault.path)?;
        }
        Ok(repo)
    }

    /// History caching never fails the action it follows.
    fn cache_history(&self, vault: &Vault, repo: &dyn GitRepository, progress: &dyn Progress) {
        progress.log("git history caching ...");
        match self.history.rebuild(&vault.key, repo) {
            Ok(count) => {
                tracing::debug!(vault = %vault.label, commits = count, "commit cache rebuilt");
                progress.log("git history caching done");
            }
            Err(err) => tracing::warn!(vault = %vault.label, error = %err, "commit cache rebuild failed"),
        }
    }

    fn require_origin(&self, tree: &VaultTree, id: VaultId) -> Result<String, SyncError> {
        self.resolve_origin(tree, id)?
            .ok_or_else(|| SyncError::MissingOrigin {
                vault: tree.get(id).map(|v| v.label.clone()).unwrap_or_default(),
            })
    }

    fn auth_for(&self, vault: &Vault) -> Result<Option<AuthenticationHandler>, SyncError> {
        auth::resolve(
            self.settings.as_ref(),
            self.secrets.as_ref(),
            &vault.key,
            &self.keys_dir,
        )
    }

    pub(crate) fn origin_resolver(&self) -> OriginResolver<'_> {
        OriginResolver::new(self.settings.as_ref(), self.engine.as_ref(), &self.locator)
    }
}

fn vault(tree: &VaultTree, id: VaultId) -> Result<&Vault, SyncError> {
    tree.get(id).ok_or(SyncError::UnknownVault(id))
}

/// First local branch, reduced to its last path segment.
fn first_local_branch(repo: &dyn GitRepository) -> Result<Option<String>, SyncError> {
    Ok(repo
        .local_branches()?
        .first()
        .and_then(|name| name.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

fn remove_dir_if_present(dir: &Path) -> Result<(), SyncError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(dir, e)),
    }
}
