//! Subcommands and the wiring they share.

pub mod auth;
pub mod auto_pull;
pub mod diagnose;
pub mod origin;
pub mod remove;
pub mod ssh_key;
pub mod status;
pub mod sync;
pub mod vault;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use vaultsync_core::config::{load_config_at, secrets_dir_at};
use vaultsync_core::settings::load_tree_at;
use vaultsync_core::{AppConfig, FileSecretStore, VaultId, VaultTree, YamlSettingsStore};
use vaultsync_git2::Git2Engine;
use vaultsync_sync::SyncOrchestrator;

/// Shortest settings-key prefix accepted as a vault reference.
const MIN_KEY_PREFIX: usize = 4;

/// Everything a command needs, built from `~/.vaultsync`.
pub struct App {
    pub home: PathBuf,
    pub config: AppConfig,
    pub settings: Arc<YamlSettingsStore>,
    pub secrets: Arc<FileSecretStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl App {
    pub fn load() -> Result<Self> {
        let home = home_dir()?;
        let config = load_config_at(&home).context("failed to load ~/.vaultsync/config.yaml")?;
        let settings = Arc::new(YamlSettingsStore::new(&home));
        let secrets = Arc::new(FileSecretStore::new(secrets_dir_at(&home)));
        let orchestrator = Arc::new(SyncOrchestrator::from_config(
            &home,
            &config,
            Arc::new(Git2Engine::new()),
            settings.clone(),
            secrets.clone(),
        ));
        Ok(Self {
            home,
            config,
            settings,
            secrets,
            orchestrator,
        })
    }

    pub fn tree(&self) -> Result<VaultTree> {
        load_tree_at(&self.home).context("failed to load registered vaults")
    }

    /// Load the tree and resolve `query` in it.
    pub fn vault(&self, query: &str) -> Result<(VaultTree, VaultId)> {
        let tree = self.tree()?;
        let id = find_vault(&tree, query)?;
        Ok((tree, id))
    }
}

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Match `query` against labels first, then settings-key prefixes.
pub fn find_vault(tree: &VaultTree, query: &str) -> Result<VaultId> {
    let by_label: Vec<VaultId> = tree
        .iter()
        .filter(|(_, v)| v.label == query)
        .map(|(id, _)| id)
        .collect();
    match by_label.as_slice() {
        [id] => return Ok(*id),
        [] => {}
        _ => bail!("label '{query}' matches {} vaults; use a settings key prefix", by_label.len()),
    }

    if query.len() >= MIN_KEY_PREFIX {
        let by_key: Vec<VaultId> = tree
            .iter()
            .filter(|(_, v)| v.key.as_str().starts_with(query))
            .map(|(id, _)| id)
            .collect();
        match by_key.as_slice() {
            [id] => return Ok(*id),
            [] => {}
            _ => bail!("key prefix '{query}' is ambiguous"),
        }
    }

    bail!("no vault matches '{query}'. Run `vaultsync vault list` to see registered vaults.")
}

/// Multi-thread tokio runtime for the commands that drive async work.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}
