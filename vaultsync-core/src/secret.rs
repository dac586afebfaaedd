//! Secret store capability.
//!
//! The sync core never stores credentials on its own; it reads and writes
//! through a [`SecretStore`] keyed by an account identifier derived from the
//! vault's settings key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{io_err, CoreError};
use crate::settings::{ensure_dir, write_atomic};
use crate::types::SettingsKey;

pub trait SecretStore: Send + Sync {
    fn save(&self, account: &str, secret: &str) -> Result<(), CoreError>;
    fn read(&self, account: &str) -> Result<Option<String>, CoreError>;
    fn delete(&self, account: &str) -> Result<(), CoreError>;
}

/// Account under which a vault's OAuth token is kept.
pub fn oauth_account(key: &SettingsKey) -> String {
    format!("GitOAuth-{key}")
}

/// One file per account, mode 0600.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, account: &str) -> Result<PathBuf, CoreError> {
        let valid = !account.is_empty()
            && account
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !account.starts_with('.');
        if !valid {
            return Err(CoreError::Secret(format!("invalid account name '{account}'")));
        }
        Ok(self.dir.join(account))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SecretStore for FileSecretStore {
    fn save(&self, account: &str, secret: &str) -> Result<(), CoreError> {
        let path = self.path_for(account)?;
        ensure_dir(&self.dir)?;
        write_atomic(&path, secret)
    }

    fn read(&self, account: &str) -> Result<Option<String>, CoreError> {
        let path = self.path_for(account)?;
        match std::fs::read_to_string(&path) {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn delete(&self, account: &str) -> Result<(), CoreError> {
        let path = self.path_for(account)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

/// Process-local store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn save(&self, account: &str, secret: &str) -> Result<(), CoreError> {
        let mut guard = self
            .secrets
            .lock()
            .map_err(|_| CoreError::Secret("secret store lock poisoned".into()))?;
        guard.insert(account.to_string(), secret.to_string());
        Ok(())
    }

    fn read(&self, account: &str) -> Result<Option<String>, CoreError> {
        let guard = self
            .secrets
            .lock()
            .map_err(|_| CoreError::Secret("secret store lock poisoned".into()))?;
        Ok(guard.get(account).cloned())
    }

    fn delete(&self, account: &str) -> Result<(), CoreError> {
        let mut guard = self
            .secrets
            .lock()
            .map_err(|_| CoreError::Secret("secret store lock poisoned".into()))?;
        guard.remove(account);
        Ok(())
    }
}
