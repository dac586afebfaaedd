//! Vaultsync core library: vault model, settings persistence, secrets, errors.
//!
//! - [`types`]: settings keys, repository settings, the vault tree
//! - [`settings`]: per-vault YAML store and global defaults
//! - [`config`]: `~/.vaultsync/config.yaml`
//! - [`secret`]: secret store capability
//! - [`credentials`]: OAuth / SSH credential bookkeeping
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod credentials;
pub mod error;
pub mod secret;
pub mod settings;
pub mod types;

pub use config::{AppConfig, StorageMode};
pub use error::CoreError;
pub use secret::{oauth_account, FileSecretStore, MemorySecretStore, SecretStore};
pub use settings::{SettingsStore, YamlSettingsStore};
pub use types::{
    AuthMode, GlobalDefaults, RepositorySettings, SettingsKey, Vault, VaultId, VaultRecord,
    VaultTree,
};
