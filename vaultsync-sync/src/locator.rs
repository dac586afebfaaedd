//! Where a vault's repository metadata lives, now and under older naming
//! schemes.
//!
//! Candidate order (first existing entry wins when opening):
//!
//! 1. `<vault>/.git`
//! 2. the primary location for the configured [`StorageMode`]
//! 3. shared mode only, for each key in `[key[..6], md5(key)[..6]]`:
//!    `<storage>/<k>.git`, then `<storage>/<k> - <label>.git`
//! 4. shared mode only, storage entries named `<k>.*.git` or `<k> - *.git`
//! 5. shared mode only, storage repositories whose `core.worktree` is the
//!    vault path
//!
//! Duplicates (after sandbox-prefix normalization) are dropped, keeping the
//! first position.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vaultsync_core::{AppConfig, StorageMode, Vault};

use crate::engine::{GitEngine, GitRepository};
use crate::error::GitError;
use crate::git_config::{normalize_sandbox_path, paths_equivalent, read_worktree};

const STABLE_KEY_LEN: usize = 6;
const PATH_HASH_LEN: usize = 4;

// ---------------------------------------------------------------------------
// 1. Sandbox scoping
// ---------------------------------------------------------------------------

/// Access to sandboxed locations, acquired around each filesystem check.
pub trait SandboxScope: Send + Sync {
    /// Returns whether access was actually started (and must be stopped).
    fn start_access(&self, path: &Path) -> bool;
    fn stop_access(&self, path: &Path);
}

/// No sandbox: every location is always accessible.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsandboxed;

impl SandboxScope for Unsandboxed {
    fn start_access(&self, _path: &Path) -> bool {
        false
    }

    fn stop_access(&self, _path: &Path) {}
}

struct ScopedAccess<'a> {
    scope: &'a dyn SandboxScope,
    path: &'a Path,
    started: bool,
}

impl<'a> ScopedAccess<'a> {
    fn start(scope: &'a dyn SandboxScope, path: &'a Path) -> Self {
        let started = scope.start_access(path);
        Self {
            scope,
            path,
            started,
        }
    }
}

impl Drop for ScopedAccess<'_> {
    fn drop(&mut self) {
        if self.started {
            self.scope.stop_access(self.path);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Locator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RepositoryLocator {
    mode: StorageMode,
    storage: PathBuf,
    sandbox: Arc<dyn SandboxScope>,
}

impl std::fmt::Debug for RepositoryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryLocator")
            .field("mode", &self.mode)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl RepositoryLocator {
    pub fn new(mode: StorageMode, storage: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            storage: storage.into(),
            sandbox: Arc::new(Unsandboxed),
        }
    }

    pub fn from_config(config: &AppConfig, home: &Path) -> Self {
        Self::new(config.storage_mode, config.git_storage_at(home))
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn SandboxScope>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    /// Whether repository metadata lives outside the vault, bound to it via
    /// `core.worktree`.
    pub fn uses_work_tree(&self) -> bool {
        self.mode != StorageMode::Inline
    }

    /// Where a new repository for `vault` is created.
    pub fn primary_location(&self, vault: &Vault) -> PathBuf {
        match self.mode {
            StorageMode::Inline => vault.path.join(".git"),
            StorageMode::Separate => {
                let digest = format!("{:x}", md5::compute(vault.path.to_string_lossy().as_bytes()));
                self.storage.join(format!(
                    "{} - {}.git",
                    &digest[..PATH_HASH_LEN],
                    vault.label
                ))
            }
            StorageMode::Shared => self
                .storage
                .join(format!("{}.git", vault.key.prefix(STABLE_KEY_LEN))),
        }
    }

    /// Scratch directory used to build a repository before it is moved to
    /// its primary location.
    pub fn staging_dir(&self, vault: &Vault) -> PathBuf {
        match self.mode {
            StorageMode::Inline => {
                let name = vault
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| vault.key.prefix(STABLE_KEY_LEN).to_string());
                vault.path.with_file_name(format!(".{name}.vaultsync-tmp"))
            }
            StorageMode::Separate | StorageMode::Shared => self.storage.join("tmp"),
        }
    }

    /// Every location that may hold the vault's repository, in precedence
    /// order, deduplicated.
    pub fn candidates(&self, vault: &Vault) -> Vec<PathBuf> {
        let mut out = Candidates::default();
        out.push(vault.path.join(".git"));
        out.push(self.primary_location(vault));

        if self.mode != StorageMode::Shared {
            return out.into_vec();
        }

        let legacy = format!("{:x}", md5::compute(vault.key.as_str().as_bytes()));
        let keys = [
            vault.key.prefix(STABLE_KEY_LEN).to_string(),
            legacy[..STABLE_KEY_LEN].to_string(),
        ];

        for key in &keys {
            out.push(self.storage.join(format!("{key}.git")));
            out.push(self.storage.join(format!("{key} - {}.git", vault.label)));
        }

        let entries = self.storage_repositories();
        for entry in &entries {
            let name = file_name(entry);
            let matches_key = keys
                .iter()
                .any(|k| name.starts_with(&format!("{k}.")) || name.starts_with(&format!("{k} - ")));
            if matches_key {
                out.push(entry.clone());
            }
        }

        for entry in entries {
            let recovered = read_worktree(&entry).is_some_and(|wt| paths_equivalent(&wt, &vault.path));
            if recovered {
                tracing::debug!(vault = %vault.label, repo = %entry.display(), "recovered repository by work tree");
                out.push(entry);
            }
        }

        out.into_vec()
    }

    /// Whether any candidate is present on disk.
    pub fn exists(&self, vault: &Vault) -> bool {
        self.candidates(vault)
            .iter()
            .any(|candidate| self.exists_scoped(vault, candidate))
    }

    /// Candidates that are present on disk, in precedence order.
    pub fn existing(&self, vault: &Vault) -> Vec<PathBuf> {
        self.candidates(vault)
            .into_iter()
            .filter(|candidate| self.exists_scoped(vault, candidate))
            .collect()
    }

    /// Open the first existing candidate that the engine accepts.
    ///
    /// Falls back to the primary location when nothing exists, so the
    /// engine's own "not found" error reaches the caller.
    pub fn open(
        &self,
        engine: &dyn GitEngine,
        vault: &Vault,
    ) -> Result<Box<dyn GitRepository>, GitError> {
        let mut first_error = None;
        for candidate in self.candidates(vault) {
            let _access = ScopedAccess::start(self.sandbox.as_ref(), &vault.path);
            if !candidate.exists() {
                continue;
            }
            match engine.open(&candidate) {
                Ok(repo) => return Ok(repo),
                Err(err) => {
                    tracing::debug!(repo = %candidate.display(), error = %err, "candidate failed to open");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => engine.open(&self.primary_location(vault)),
        }
    }

    /// Number of `*.git` entries in the storage area, when it is readable.
    pub fn storage_repository_count(&self) -> Option<usize> {
        if self.mode == StorageMode::Inline {
            return None;
        }
        std::fs::read_dir(&self.storage).ok()?;
        Some(self.storage_repositories().len())
    }

    fn exists_scoped(&self, vault: &Vault, target: &Path) -> bool {
        let _access = ScopedAccess::start(self.sandbox.as_ref(), &vault.path);
        target.exists()
    }

    /// `*.git` entries of the storage area, sorted by name.
    fn storage_repositories(&self) -> Vec<PathBuf> {
        let Ok(read) = std::fs::read_dir(&self.storage) else {
            return Vec::new();
        };
        let mut entries: Vec<PathBuf> = read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| file_name(p).ends_with(".git"))
            .collect();
        entries.sort();
        entries
    }
}

#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    paths: Vec<PathBuf>,
}

impl Candidates {
    fn push(&mut self, path: PathBuf) {
        if self.seen.insert(normalize_sandbox_path(&path)) {
            self.paths.push(path);
        }
    }

    fn into_vec(self) -> Vec<PathBuf> {
        self.paths
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
