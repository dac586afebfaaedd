//! Per-vault YAML settings store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.vaultsync/
//!   defaults.yaml            (process-wide defaults, mode 0600)
//!   vaults/
//!     <settings_key>.yaml    (vault record + repository settings, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Settings are always replaced as a whole object and persisted in one
//! atomic write; there are no field-level updates.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, CoreError};
use crate::types::{GlobalDefaults, RepositorySettings, SettingsKey, VaultRecord, VaultTree};

// ---------------------------------------------------------------------------
// 1. Store capability
// ---------------------------------------------------------------------------

/// Logical settings persistence used by the sync core.
///
/// Implementations own the actual storage; callers only read and write
/// whole [`RepositorySettings`] values.
pub trait SettingsStore: Send + Sync {
    fn load_settings(&self, key: &SettingsKey) -> Result<RepositorySettings, CoreError>;
    fn save_settings(&self, key: &SettingsKey, settings: &RepositorySettings)
        -> Result<(), CoreError>;
    fn global_origin(&self) -> Result<Option<String>, CoreError>;
    fn set_global_origin(&self, origin: Option<&str>) -> Result<(), CoreError>;
}

/// [`SettingsStore`] backed by the `~/.vaultsync/` YAML files.
#[derive(Debug, Clone)]
pub struct YamlSettingsStore {
    home: PathBuf,
}

impl YamlSettingsStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

impl SettingsStore for YamlSettingsStore {
    fn load_settings(&self, key: &SettingsKey) -> Result<RepositorySettings, CoreError> {
        Ok(load_vault_at(&self.home, key)?.settings)
    }

    fn save_settings(
        &self,
        key: &SettingsKey,
        settings: &RepositorySettings,
    ) -> Result<(), CoreError> {
        let mut record = load_vault_at(&self.home, key)?;
        record.settings = settings.clone();
        record.updated_at = Utc::now();
        save_vault_at(&self.home, &record)
    }

    fn global_origin(&self) -> Result<Option<String>, CoreError> {
        Ok(load_defaults_at(&self.home)?
            .origin
            .filter(|o| !o.is_empty()))
    }

    fn set_global_origin(&self, origin: Option<&str>) -> Result<(), CoreError> {
        let mut defaults = load_defaults_at(&self.home)?;
        defaults.origin = origin.filter(|o| !o.is_empty()).map(str::to_string);
        save_defaults_at(&self.home, &defaults)
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.vaultsync`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".vaultsync")
}

/// `<home>/.vaultsync/vaults/`
pub fn vaults_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("vaults")
}

/// `<home>/.vaultsync/vaults/<key>.yaml`: pure, no I/O.
pub fn vault_path_at(home: &Path, key: &SettingsKey) -> PathBuf {
    vaults_dir_at(home).join(format!("{}.yaml", key.0))
}

/// `<home>/.vaultsync/defaults.yaml`
pub fn defaults_path_at(home: &Path) -> PathBuf {
    root_at(home).join("defaults.yaml")
}

// ---------------------------------------------------------------------------
// 3. Vault records
// ---------------------------------------------------------------------------

/// Load a single vault record.
///
/// Returns `CoreError::VaultNotFound` if absent, `CoreError::Parse` if malformed.
pub fn load_vault_at(home: &Path, key: &SettingsKey) -> Result<VaultRecord, CoreError> {
    let path = vault_path_at(home, key);
    if !path.exists() {
        return Err(CoreError::VaultNotFound { key: key.0.clone() });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// Atomically save a vault record.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_vault_at(home: &Path, record: &VaultRecord) -> Result<(), CoreError> {
    let dir = vaults_dir_at(home);
    ensure_dir(&dir)?;
    let path = vault_path_at(home, &record.key);
    let yaml = serde_yaml::to_string(record)?;
    write_atomic(&path, &yaml)
}

/// All registered vaults, sorted by label then key.
pub fn list_vaults_at(home: &Path) -> Result<Vec<VaultRecord>, CoreError> {
    let dir = vaults_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut records = Vec::new();
    for entry in entries {
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(".yaml") {
            continue;
        }
        let path = entry.path();
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let record: VaultRecord =
            serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })?;
        records.push(record);
    }
    records.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));
    Ok(records)
}

/// `list_vaults_at` convenience wrapper.
pub fn list_vaults() -> Result<Vec<VaultRecord>, CoreError> {
    list_vaults_at(&home()?)
}

/// Build the [`VaultTree`] of every registered vault.
pub fn load_tree_at(home: &Path) -> Result<VaultTree, CoreError> {
    Ok(VaultTree::from_records(&list_vaults_at(home)?))
}

/// Register the vault rooted at `path`.
///
/// Idempotent: if a record already exists for the path's key, it is returned
/// unchanged.
pub fn register_vault_at(
    home: &Path,
    path: PathBuf,
    label: Option<String>,
    parent: Option<SettingsKey>,
) -> Result<VaultRecord, CoreError> {
    let key = SettingsKey::for_path(&path);
    if vault_path_at(home, &key).exists() {
        return load_vault_at(home, &key);
    }

    let label = label.unwrap_or_else(|| {
        path.file_name()
            .unwrap_or_else(|| path.as_os_str())
            .to_string_lossy()
            .into_owned()
    });
    let now = Utc::now();
    let record = VaultRecord {
        key,
        label,
        path,
        parent,
        settings: RepositorySettings::default(),
        created_at: now,
        updated_at: now,
    };
    save_vault_at(home, &record)?;
    tracing::info!(vault = %record.label, key = %record.key.prefix(8), "registered vault");
    Ok(record)
}

/// `register_vault_at` convenience wrapper.
pub fn register_vault(
    path: PathBuf,
    label: Option<String>,
    parent: Option<SettingsKey>,
) -> Result<VaultRecord, CoreError> {
    register_vault_at(&home()?, path, label, parent)
}

// ---------------------------------------------------------------------------
// 4. Global defaults
// ---------------------------------------------------------------------------

/// Load `defaults.yaml`; returns defaults when the file is missing.
pub fn load_defaults_at(home: &Path) -> Result<GlobalDefaults, CoreError> {
    let path = defaults_path_at(home);
    if !path.exists() {
        return Ok(GlobalDefaults::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

pub fn save_defaults_at(home: &Path, defaults: &GlobalDefaults) -> Result<(), CoreError> {
    ensure_dir(&root_at(home))?;
    let yaml = serde_yaml::to_string(defaults)?;
    write_atomic(&defaults_path_at(home), &yaml)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), CoreError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

/// `.tmp` sibling + `chmod 0600` + rename. The tmp file lives in the same
/// directory as the target so the rename never crosses filesystems.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), CoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
pub(crate) fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
