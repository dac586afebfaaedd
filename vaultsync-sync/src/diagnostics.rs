//! One-line repository diagnostics for a vault.
//!
//! `vault=.. | settingsKey=.. | repo=found|missing | candidates=.. |
//! gitStorageCount=.. | globalOrigin=empty|set | repoPath=.. |
//! remotes=..|none | openRepo=failed | origin=empty|set |
//! originSource=auto|settings|none`
//!
//! `gitStorageCount` is omitted in inline mode, `repoPath` when no candidate
//! exists. Either `remotes` or `openRepo=failed` appears, never both.

use std::path::Path;

use vaultsync_core::{VaultId, VaultTree};

use crate::error::SyncError;
use crate::orchestrator::SyncOrchestrator;

/// Build the summary. Like the sync path, this may write a discovered
/// origin back to the vault settings.
pub fn diagnostics_summary(
    orchestrator: &SyncOrchestrator,
    tree: &VaultTree,
    id: VaultId,
) -> Result<String, SyncError> {
    let vault = tree.get(id).ok_or(SyncError::UnknownVault(id))?;
    let locator = orchestrator.locator();
    let settings = orchestrator.settings();

    let candidates = locator.candidates(vault);
    let existing = locator.existing(vault);

    let mut parts = vec![
        format!("vault={}", vault.label),
        format!("settingsKey={}", vault.key.prefix(8)),
        format!("repo={}", if existing.is_empty() { "missing" } else { "found" }),
        format!(
            "candidates={}",
            candidates.iter().map(|p| file_name(p)).collect::<Vec<_>>().join(",")
        ),
    ];

    if let Some(count) = locator.storage_repository_count() {
        parts.push(format!("gitStorageCount={count}"));
    }
    parts.push(format!("globalOrigin={}", empty_or_set(settings.global_origin()?.as_deref())));

    if let Some(repo_path) = existing.first() {
        parts.push(format!("repoPath={}", file_name(repo_path)));
    }

    match locator.open(orchestrator.engine(), vault) {
        Ok(repo) => {
            let names = repo.remote_names().unwrap_or_default();
            if names.is_empty() {
                parts.push("remotes=none".to_string());
            } else {
                let remotes: Vec<String> = names
                    .iter()
                    .map(|name| {
                        let url = repo.remote_url(name).ok().flatten().unwrap_or_else(|| "-".into());
                        format!("{name}={url}")
                    })
                    .collect();
                parts.push(format!("remotes={}", remotes.join(",")));
            }
        }
        Err(err) => {
            tracing::debug!(vault = %vault.label, error = %err, "diagnostics could not open repository");
            parts.push("openRepo=failed".to_string());
        }
    }

    let had_origin = settings.load_settings(&vault.key)?.origin().map(str::to_string);
    let synced = orchestrator.origin_resolver().sync_from_local_repository(vault)?;
    let origin = settings.load_settings(&vault.key)?.origin().map(str::to_string);

    parts.push(format!("origin={}", empty_or_set(origin.as_deref())));
    let source = if synced && had_origin != origin {
        "auto"
    } else if had_origin.is_some() {
        "settings"
    } else {
        "none"
    };
    parts.push(format!("originSource={source}"));

    Ok(parts.join(" | "))
}

fn empty_or_set(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "set",
        _ => "empty",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;
    use crate::history_cache::HistoryCache;
    use crate::locator::RepositoryLocator;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vaultsync_core::settings::{load_tree_at, register_vault_at};
    use vaultsync_core::{MemorySecretStore, SettingsStore, StorageMode, YamlSettingsStore};

    fn setup(mode: StorageMode) -> (TempDir, FakeEngine, SyncOrchestrator, VaultTree, VaultId) {
        let home = TempDir::new().expect("home");
        let notes = home.path().join("notes");
        std::fs::create_dir_all(&notes).expect("notes");
        let record = register_vault_at(home.path(), notes, Some("Notes".into()), None).expect("reg");
        let tree = load_tree_at(home.path()).expect("tree");
        let id = tree.find_by_key(&record.key).expect("id");

        let engine = FakeEngine::new();
        let storage = home.path().join("storage");
        std::fs::create_dir_all(&storage).expect("storage");
        let orchestrator = SyncOrchestrator::new(
            Arc::new(engine.clone()),
            Arc::new(YamlSettingsStore::new(home.path())),
            Arc::new(MemorySecretStore::new()),
            RepositoryLocator::new(mode, storage),
            HistoryCache::new(home.path().join("cache")),
            home.path().join("keys"),
        );
        (home, engine, orchestrator, tree, id)
    }

    #[test]
    fn missing_repository_summary() {
        let (_home, _engine, orchestrator, tree, id) = setup(StorageMode::Inline);
        let summary = diagnostics_summary(&orchestrator, &tree, id).expect("summary");
        let key = &tree.get(id).expect("vault").key;
        assert_eq!(
            summary,
            format!(
                "vault=Notes | settingsKey={} | repo=missing | candidates=.git | \
                 globalOrigin=empty | openRepo=failed | origin=empty | originSource=none",
                key.prefix(8)
            )
        );
    }

    #[test]
    fn discovered_origin_is_reported_as_auto() {
        let (_home, engine, orchestrator, tree, id) = setup(StorageMode::Shared);
        let vault = tree.get(id).expect("vault");
        std::fs::create_dir_all(orchestrator.locator().primary_location(vault)).expect("repo");
        engine
            .state()
            .remotes
            .push(("origin".into(), "git@example.com:u/r.git".into()));

        let summary = diagnostics_summary(&orchestrator, &tree, id).expect("summary");
        assert!(summary.contains("repo=found"), "{summary}");
        assert!(summary.contains("gitStorageCount=1"), "{summary}");
        assert!(summary.contains("remotes=origin=git@example.com:u/r.git"), "{summary}");
        assert!(summary.ends_with("origin=set | originSource=auto"), "{summary}");

        // The origin now lives in settings.
        let again = diagnostics_summary(&orchestrator, &tree, id).expect("summary");
        assert!(again.contains("globalOrigin=set"), "{again}");
        assert!(again.ends_with("originSource=settings"), "{again}");
        assert_eq!(
            orchestrator
                .settings()
                .load_settings(&vault.key)
                .expect("settings")
                .origin(),
            Some("git@example.com:u/r.git")
        );
    }
}
