use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use vaultsync_core::settings::{load_tree_at, register_vault_at};
use vaultsync_core::{
    CoreError, RepositorySettings, SettingsKey, SettingsStore, StorageMode, VaultTree,
    YamlSettingsStore,
};
use vaultsync_sync::{GitEngine, GitError, GitRepository, OriginResolver, RepositoryLocator};

/// Engine that never finds a repository, so discovery falls back to the
/// `.git/config` file.
struct NoRepositoryEngine;

impl GitEngine for NoRepositoryEngine {
    fn open(&self, git_dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        Err(GitError::engine("could not open", -3, git_dir.display().to_string()))
    }

    fn init(&self, _dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        Err(GitError::engine("init unsupported", -1, ""))
    }

    fn clone_repo(
        &self,
        _origin: &str,
        _dir: &Path,
        _auth: Option<&vaultsync_sync::AuthenticationHandler>,
    ) -> Result<Box<dyn GitRepository>, GitError> {
        Err(GitError::engine("clone unsupported", -1, ""))
    }
}

/// Counts every write that reaches the YAML store.
struct CountingStore {
    inner: YamlSettingsStore,
    writes: AtomicUsize,
}

impl CountingStore {
    fn new(home: &Path) -> Self {
        Self {
            inner: YamlSettingsStore::new(home),
            writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
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

fn vault_dir(home: &TempDir, name: &str) -> std::path::PathBuf {
    let path = home.path().join(name);
    std::fs::create_dir_all(&path).expect("vault dir");
    path
}

fn tree(home: &TempDir) -> VaultTree {
    load_tree_at(home.path()).expect("tree")
}

#[test]
fn own_setting_wins_and_nothing_is_written() {
    let home = TempDir::new().expect("home");
    let record = register_vault_at(home.path(), vault_dir(&home, "notes"), None, None).expect("reg");
    let store = CountingStore::new(home.path());
    let mut settings = store.load_settings(&record.key).expect("load");
    settings.set_origin("git@example.com:me/notes.git");
    store.inner.save_settings(&record.key, &settings).expect("save");
    store.inner.set_global_origin(Some("git@example.com:me/other.git")).expect("global");

    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &NoRepositoryEngine, &locator);
    let tree = tree(&home);
    let id = tree.find_by_key(&record.key).expect("id");

    assert_eq!(
        resolver.resolve_origin(&tree, id).expect("origin").as_deref(),
        Some("git@example.com:me/notes.git")
    );
    assert_eq!(store.writes(), 0);
}

#[test]
fn global_default_is_copied_once() {
    let home = TempDir::new().expect("home");
    let record = register_vault_at(home.path(), vault_dir(&home, "notes"), None, None).expect("reg");
    let store = CountingStore::new(home.path());
    store.inner.set_global_origin(Some("git@example.com:me/all.git")).expect("global");

    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &NoRepositoryEngine, &locator);
    let tree = tree(&home);
    let id = tree.find_by_key(&record.key).expect("id");

    let first = resolver.resolve_origin(&tree, id).expect("origin");
    assert_eq!(first.as_deref(), Some("git@example.com:me/all.git"));
    assert_eq!(store.writes(), 1);

    let second = resolver.resolve_origin(&tree, id).expect("origin");
    assert_eq!(second, first);
    assert_eq!(store.writes(), 1, "second resolution must not write");
}

#[test]
fn parent_origin_is_inherited_and_becomes_global() {
    let home = TempDir::new().expect("home");
    let parent_dir = vault_dir(&home, "notes");
    let parent = register_vault_at(home.path(), parent_dir.clone(), None, None).expect("parent");
    let child_dir = parent_dir.join("journal");
    std::fs::create_dir_all(&child_dir).expect("child dir");
    let child = register_vault_at(home.path(), child_dir, None, Some(parent.key.clone())).expect("child");

    let store = CountingStore::new(home.path());
    let mut settings = store.load_settings(&parent.key).expect("load");
    settings.set_origin("git@example.com:me/notes.git");
    store.inner.save_settings(&parent.key, &settings).expect("save");

    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &NoRepositoryEngine, &locator);
    let tree = tree(&home);
    let id = tree.find_by_key(&child.key).expect("id");

    assert_eq!(
        resolver.resolve_origin(&tree, id).expect("origin").as_deref(),
        Some("git@example.com:me/notes.git")
    );
    assert_eq!(
        store.load_settings(&child.key).expect("child").origin(),
        Some("git@example.com:me/notes.git")
    );
    assert_eq!(
        store.global_origin().expect("global").as_deref(),
        Some("git@example.com:me/notes.git")
    );

    let writes = store.writes();
    resolver.resolve_origin(&tree, id).expect("again");
    assert_eq!(store.writes(), writes);
}

#[test]
fn dot_git_config_is_the_last_resort() {
    let home = TempDir::new().expect("home");
    let notes = vault_dir(&home, "notes");
    std::fs::create_dir_all(notes.join(".git")).expect(".git");
    std::fs::write(
        notes.join(".git").join("config"),
        "[core]\n\tbare = false\n[remote \"origin\"]\n\turl = https://example.com/me/notes.git\n",
    )
    .expect("config");
    let record = register_vault_at(home.path(), notes, None, None).expect("reg");

    let store = CountingStore::new(home.path());
    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &NoRepositoryEngine, &locator);
    let tree = tree(&home);
    let id = tree.find_by_key(&record.key).expect("id");

    assert_eq!(
        resolver.resolve_origin(&tree, id).expect("origin").as_deref(),
        Some("https://example.com/me/notes.git")
    );
    assert_eq!(
        store.global_origin().expect("global").as_deref(),
        Some("https://example.com/me/notes.git")
    );
}

#[test]
fn no_source_yields_none_without_writes() {
    let home = TempDir::new().expect("home");
    let record = register_vault_at(home.path(), vault_dir(&home, "notes"), None, None).expect("reg");
    let store = CountingStore::new(home.path());
    let locator = RepositoryLocator::new(StorageMode::Inline, home.path().join("storage"));
    let resolver = OriginResolver::new(&store, &NoRepositoryEngine, &locator);
    let tree = tree(&home);
    let id = tree.find_by_key(&record.key).expect("id");

    assert_eq!(resolver.resolve_origin(&tree, id).expect("origin"), None);
    assert_eq!(store.writes(), 0);
}
