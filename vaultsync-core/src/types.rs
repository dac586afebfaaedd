//! Domain types for vaults and their repository settings.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All persisted types are serializable via serde + serde_yaml.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable opaque identifier of a vault, used to key settings, secrets,
/// repository storage names and cache files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettingsKey(pub String);

impl SettingsKey {
    /// Derive the key for a vault rooted at `path` (hex SHA-256 of the path).
    pub fn for_path(path: &Path) -> Self {
        let mut h = Sha256::new();
        h.update(path.to_string_lossy().as_bytes());
        Self(hex::encode(h.finalize()))
    }

    /// The first `len` characters of the key (whole key when shorter).
    pub fn prefix(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SettingsKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SettingsKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Index of a vault inside a [`VaultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultId(pub usize);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a vault authenticates against its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    #[serde(rename = "ssh_key")]
    SshKey,
    #[serde(rename = "oauth")]
    OAuth,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => write!(f, "none"),
            AuthMode::SshKey => write!(f, "ssh_key"),
            AuthMode::OAuth => write!(f, "oauth"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-vault repository settings.
///
/// Mutated as a whole: callers load, modify a copy, then save the entire
/// value back through the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepositorySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// `None` means "not chosen"; credential resolution then prefers OAuth
    /// unless an SSH key is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_passphrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_username: Option<String>,
    #[serde(default)]
    pub auto_pull: bool,
}

impl RepositorySettings {
    /// The configured origin, treating an empty string as unset.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref().filter(|o| !o.is_empty())
    }

    /// Set (or clear, with an empty string) the origin URL.
    pub fn set_origin(&mut self, origin: &str) {
        let trimmed = origin.trim();
        self.origin = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    pub fn has_ssh_key(&self) -> bool {
        self.ssh_private_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Drop all SSH key material.
    pub fn clear_ssh_key(&mut self) {
        self.ssh_private_key = None;
        self.ssh_public_key = None;
        self.ssh_passphrase = None;
    }

    /// Whether OAuth credentials may be used for this vault.
    ///
    /// OAuth wins when explicitly selected, or when no mode is chosen and no
    /// SSH key is configured.
    pub fn prefers_oauth(&self) -> bool {
        match self.auth_mode {
            Some(AuthMode::OAuth) => true,
            None => !self.has_ssh_key(),
            Some(_) => false,
        }
    }
}

/// Process-wide defaults shared by every vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GlobalDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

// ---------------------------------------------------------------------------
// Vaults
// ---------------------------------------------------------------------------

/// A root or nested folder owning notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub key: SettingsKey,
    pub label: String,
    /// Absolute path to the vault root on disk.
    pub path: PathBuf,
    pub parent: Option<VaultId>,
    pub children: Vec<VaultId>,
}

/// On-disk record of a registered vault, stored alongside its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub key: SettingsKey,
    pub label: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SettingsKey>,
    #[serde(default)]
    pub settings: RepositorySettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Arena of vaults. Parents are back references by id; a vault owns the ids
/// of its children.
#[derive(Debug, Clone, Default)]
pub struct VaultTree {
    vaults: Vec<Vault>,
}

impl VaultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vault under `parent` (or as a root) and return its id.
    pub fn insert(
        &mut self,
        key: SettingsKey,
        label: impl Into<String>,
        path: impl Into<PathBuf>,
        parent: Option<VaultId>,
    ) -> VaultId {
        let id = VaultId(self.vaults.len());
        self.vaults.push(Vault {
            key,
            label: label.into(),
            path: path.into(),
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            if let Some(p) = self.vaults.get_mut(parent.0) {
                p.children.push(id);
            }
        }
        id
    }

    /// Build a tree from persisted records, resolving parents by key.
    ///
    /// Records whose parent key is unknown become roots.
    pub fn from_records(records: &[VaultRecord]) -> Self {
        let mut tree = Self::new();
        let mut pending: Vec<&VaultRecord> = records.iter().collect();
        // Insert parents before children; records referencing a missing parent
        // fall through as roots once no progress can be made.
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|record| {
                let parent = match &record.parent {
                    None => None,
                    Some(key) => match tree.find_by_key(key) {
                        Some(id) => Some(id),
                        None => return true,
                    },
                };
                tree.insert(record.key.clone(), &record.label, &record.path, parent);
                false
            });
            if pending.len() == before {
                for record in pending.drain(..) {
                    tree.insert(record.key.clone(), &record.label, &record.path, None);
                }
            }
        }
        tree
    }

    pub fn get(&self, id: VaultId) -> Option<&Vault> {
        self.vaults.get(id.0)
    }

    pub fn find_by_key(&self, key: &SettingsKey) -> Option<VaultId> {
        self.vaults.iter().position(|v| &v.key == key).map(VaultId)
    }

    /// Ancestors of `id`, nearest first. Does not include `id` itself.
    pub fn ancestors(&self, id: VaultId) -> Vec<VaultId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|v| v.parent);
        while let Some(parent) = current {
            // A malformed tree must not loop forever.
            if out.contains(&parent) || parent == id {
                break;
            }
            out.push(parent);
            current = self.get(parent).and_then(|v| v.parent);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (VaultId, &Vault)> {
        self.vaults.iter().enumerate().map(|(i, v)| (VaultId(i), v))
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
