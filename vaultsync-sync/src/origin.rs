//! Remote URL resolution with write-back.
//!
//! First non-empty source wins:
//!
//! 1. the vault's own setting
//! 2. the global default (copied into the vault)
//! 3. the nearest ancestor that has one (copied into the vault and the global
//!    default)
//! 4. the local repository's `origin` remote, else the first remote with a URL
//! 5. the vault's `.git` config file, parsed directly
//!
//! Sources 4 and 5 are written to the vault and the global default. After one
//! successful call the vault's own setting answers every later call, so no
//! further writes happen.

use vaultsync_core::{SettingsStore, Vault, VaultId, VaultTree};

use crate::engine::GitEngine;
use crate::error::SyncError;
use crate::git_config::read_origin_from_dot_git;
use crate::locator::RepositoryLocator;

pub struct OriginResolver<'a> {
    settings: &'a dyn SettingsStore,
    engine: &'a dyn GitEngine,
    locator: &'a RepositoryLocator,
}

impl<'a> OriginResolver<'a> {
    pub fn new(
        settings: &'a dyn SettingsStore,
        engine: &'a dyn GitEngine,
        locator: &'a RepositoryLocator,
    ) -> Self {
        Self {
            settings,
            engine,
            locator,
        }
    }

    pub fn resolve_origin(
        &self,
        tree: &VaultTree,
        id: VaultId,
    ) -> Result<Option<String>, SyncError> {
        let vault = tree.get(id).ok_or(SyncError::UnknownVault(id))?;
        let mut settings = self.settings.load_settings(&vault.key)?;

        if let Some(origin) = settings.origin() {
            return Ok(Some(origin.to_string()));
        }

        if let Some(global) = self.settings.global_origin()? {
            settings.set_origin(&global);
            self.settings.save_settings(&vault.key, &settings)?;
            return Ok(Some(global));
        }

        if let Some(inherited) = self.inherited_origin(tree, id)? {
            settings.set_origin(&inherited);
            self.settings.set_global_origin(Some(&inherited))?;
            self.settings.save_settings(&vault.key, &settings)?;
            tracing::info!(vault = %vault.label, "inherited origin from parent vault");
            return Ok(Some(inherited));
        }

        if self.sync_from_local_repository(vault)? {
            let settings = self.settings.load_settings(&vault.key)?;
            return Ok(settings.origin().map(str::to_string));
        }

        Ok(None)
    }

    /// Copy the origin recorded in the vault's repository into its settings.
    ///
    /// Returns `true` when the vault ends up with an origin (including when
    /// it already had one).
    pub fn sync_from_local_repository(&self, vault: &Vault) -> Result<bool, SyncError> {
        let mut settings = self.settings.load_settings(&vault.key)?;
        if settings.origin().is_some() {
            return Ok(true);
        }

        let Some(found) = self
            .origin_from_repository(vault)
            .or_else(|| read_origin_from_dot_git(&vault.path))
        else {
            return Ok(false);
        };

        settings.set_origin(&found);
        self.settings.set_global_origin(Some(&found))?;
        self.settings.save_settings(&vault.key, &settings)?;
        tracing::info!(vault = %vault.label, "discovered origin from local repository");
        Ok(true)
    }

    fn inherited_origin(&self, tree: &VaultTree, id: VaultId) -> Result<Option<String>, SyncError> {
        for ancestor in tree.ancestors(id) {
            let Some(parent) = tree.get(ancestor) else {
                continue;
            };
            if let Some(origin) = self.settings.load_settings(&parent.key)?.origin() {
                return Ok(Some(origin.to_string()));
            }
        }
        Ok(None)
    }

    fn origin_from_repository(&self, vault: &Vault) -> Option<String> {
        let repo = self.locator.open(self.engine, vault).ok()?;

        if let Ok(Some(url)) = repo.remote_url("origin") {
            if !url.is_empty() {
                return Some(url);
            }
        }

        repo.remote_names()
            .ok()?
            .iter()
            .find_map(|name| repo.remote_url(name).ok().flatten().filter(|u| !u.is_empty()))
    }
}
