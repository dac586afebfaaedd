//! Origin discovery from the remotes of a real repository.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use vaultsync_core::settings::{load_tree_at, register_vault_at};
use vaultsync_core::{
    CoreError, RepositorySettings, SettingsKey, SettingsStore, StorageMode, YamlSettingsStore,
};
use vaultsync_git2::Git2Engine;
use vaultsync_sync::{OriginResolver, RepositoryLocator};

/// Counts every write that reaches the YAML store.
struct CountingStore {
    inner: YamlSettingsStore,
    writes: AtomicUsize,
}

impl SettingsStore for CountingStore {
    fn load_settings(&self, key: &SettingsKey) -> Result<RepositorySettings, CoreError> {
        self.inner.load_settings(key)
    }

    fn save_settings(&self, key: &SettingsKey, settings: &RepositorySettings) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_settings(key, settings)
    }

    fn global_origin(&self) -> Result<Option<String>, CoreError> {
        self.inner.global_origin()
    }

    fn set_global_origin(&self, origin: Option<&str>) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_global_origin(origin)
    }
}

fn counting(home: &Path) -> CountingStore {
    CountingStore {
        inner: YamlSettingsStore::new(home),
        writes: AtomicUsize::new(0),
    }
}

#[test]
fn first_remote_is_used_when_there_is_no_origin_remote() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("notes");
    std::fs::create_dir_all(&path).unwrap();
    let repo = git2::Repository::init(&path).unwrap();
    repo.remote("upstream", "git@example.com:u/up.git").unwrap();

    let key = register_vault_at(home.path(), path, None, None).unwrap().key;
    let tree = load_tree_at(home.path()).unwrap();
    let id = tree.find_by_key(&key).unwrap();

    let store = counting(home.path());
    let engine = Git2Engine::new();
    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &engine, &locator);

    assert_eq!(
        resolver.resolve_origin(&tree, id).unwrap().as_deref(),
        Some("git@example.com:u/up.git")
    );
    assert_eq!(
        store.load_settings(&key).unwrap().origin(),
        Some("git@example.com:u/up.git")
    );
    assert_eq!(
        store.global_origin().unwrap().as_deref(),
        Some("git@example.com:u/up.git")
    );

    let writes = store.writes.load(Ordering::SeqCst);
    assert_eq!(
        resolver.resolve_origin(&tree, id).unwrap().as_deref(),
        Some("git@example.com:u/up.git")
    );
    assert_eq!(store.writes.load(Ordering::SeqCst), writes);
}

#[test]
fn origin_remote_wins_over_other_remotes() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("notes");
    std::fs::create_dir_all(&path).unwrap();
    let repo = git2::Repository::init(&path).unwrap();
    repo.remote("backup", "git@example.com:u/backup.git").unwrap();
    repo.remote("origin", "git@example.com:u/notes.git").unwrap();

    let key = register_vault_at(home.path(), path, None, None).unwrap().key;
    let tree = load_tree_at(home.path()).unwrap();
    let id = tree.find_by_key(&key).unwrap();

    let store = counting(home.path());
    let engine = Git2Engine::new();
    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &engine, &locator);

    assert_eq!(
        resolver.resolve_origin(&tree, id).unwrap().as_deref(),
        Some("git@example.com:u/notes.git")
    );
}
