//! Application configuration: `~/.vaultsync/config.yaml`.
//!
//! A missing file yields [`AppConfig::default`]. Relative directories are
//! resolved against `~/.vaultsync/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::settings::{ensure_dir, home, root_at, write_atomic};

pub const DEFAULT_SIGNATURE_NAME: &str = "FSNotes App";
pub const DEFAULT_SIGNATURE_EMAIL: &str = "support@fsnot.es";
pub const DEFAULT_AUTO_PULL_SECS: u64 = 30;

/// Where a vault's repository metadata lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// `<vault>/.git`
    #[default]
    Inline,
    /// A dedicated storage area on this device, work tree bound to the vault.
    Separate,
    /// A storage area synced across devices; enables legacy-name recovery.
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    /// Storage area for `separate`/`shared` modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_storage: Option<PathBuf>,
    /// Directory holding commit-diff cache files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_signature_name")]
    pub signature_name: String,
    #[serde(default = "default_signature_email")]
    pub signature_email: String,
    #[serde(default = "default_auto_pull_secs")]
    pub auto_pull_interval_secs: u64,
}

fn default_signature_name() -> String {
    DEFAULT_SIGNATURE_NAME.to_string()
}

fn default_signature_email() -> String {
    DEFAULT_SIGNATURE_EMAIL.to_string()
}

fn default_auto_pull_secs() -> u64 {
    DEFAULT_AUTO_PULL_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            git_storage: None,
            cache_dir: None,
            signature_name: default_signature_name(),
            signature_email: default_signature_email(),
            auto_pull_interval_secs: default_auto_pull_secs(),
        }
    }
}

impl AppConfig {
    /// Storage area, defaulting to `~/.vaultsync/repositories`.
    pub fn git_storage_at(&self, home: &Path) -> PathBuf {
        resolve(home, self.git_storage.as_deref(), "repositories")
    }

    /// Cache directory, defaulting to `~/.vaultsync/cache`.
    pub fn cache_dir_at(&self, home: &Path) -> PathBuf {
        resolve(home, self.cache_dir.as_deref(), "cache")
    }

    pub fn auto_pull_interval(&self) -> Duration {
        Duration::from_secs(self.auto_pull_interval_secs.max(1))
    }
}

/// `<home>/.vaultsync/keys`: installed SSH keys.
pub fn keys_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("keys")
}

/// `<home>/.vaultsync/secrets`: file-backed secret store.
pub fn secrets_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("secrets")
}

pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

pub fn load_config_at(home: &Path) -> Result<AppConfig, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_config_at` convenience wrapper.
pub fn load_config() -> Result<AppConfig, CoreError> {
    load_config_at(&home()?)
}

pub fn save_config_at(home: &Path, config: &AppConfig) -> Result<(), CoreError> {
    ensure_dir(&root_at(home))?;
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path_at(home), &yaml)
}

fn resolve(home: &Path, configured: Option<&Path>, default_name: &str) -> PathBuf {
    match configured {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => root_at(home).join(p),
        None => root_at(home).join(default_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("home");
        let cfg = load_config_at(home.path()).expect("load");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.signature_name, "FSNotes App");
        assert_eq!(cfg.auto_pull_interval(), Duration::from_secs(30));
    }

    #[rstest]
    #[case("storage_mode: inline\n", StorageMode::Inline)]
    #[case("storage_mode: separate\n", StorageMode::Separate)]
    #[case("storage_mode: shared\ngit_storage: /mnt/sync/git\n", StorageMode::Shared)]
    fn parses_storage_mode(#[case] yaml: &str, #[case] expected: StorageMode) {
        let home = TempDir::new().expect("home");
        std::fs::create_dir_all(root_at(home.path())).expect("mkdir");
        std::fs::write(config_path_at(home.path()), yaml).expect("write");
        let cfg = load_config_at(home.path()).expect("load");
        assert_eq!(cfg.storage_mode, expected);
        assert_eq!(cfg.signature_email, "support@fsnot.es");
    }

    #[test]
    fn relative_dirs_resolve_under_root() {
        let home = TempDir::new().expect("home");
        let cfg = AppConfig {
            git_storage: Some(PathBuf::from("git")),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.git_storage_at(home.path()),
            home.path().join(".vaultsync").join("git")
        );
        assert_eq!(
            cfg.cache_dir_at(home.path()),
            home.path().join(".vaultsync").join("cache")
        );
    }

    #[test]
    fn save_then_load_roundtrip() {
        let home = TempDir::new().expect("home");
        let cfg = AppConfig {
            storage_mode: StorageMode::Shared,
            git_storage: Some(PathBuf::from("/srv/git")),
            auto_pull_interval_secs: 60,
            ..AppConfig::default()
        };
        save_config_at(home.path(), &cfg).expect("save");
        assert_eq!(load_config_at(home.path()).expect("load"), cfg);
    }
}
