//! Credential strategy selected once per sync action.

use std::path::{Path, PathBuf};

use vaultsync_core::credentials::{oauth_token, DEFAULT_OAUTH_USERNAME};
use vaultsync_core::{SecretStore, SettingsKey, SettingsStore};

use crate::error::{io_err, SyncError};

/// What the git engine presents to the remote.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthenticationHandler {
    /// Username plus password-equivalent (an OAuth bearer token).
    Password { username: String, password: String },
    /// Installed private key file and its passphrase.
    SshKey {
        private_key_path: PathBuf,
        public_key_path: Option<PathBuf>,
        passphrase: String,
    },
}

impl std::fmt::Debug for AuthenticationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::SshKey {
                private_key_path, ..
            } => f
                .debug_struct("SshKey")
                .field("private_key_path", private_key_path)
                .finish_non_exhaustive(),
        }
    }
}

/// Pick the handler for `key`.
///
/// OAuth is used when the settings prefer it and a token is available;
/// otherwise the SSH key (if any) is installed under `keys_dir`.
pub fn resolve(
    settings: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
    keys_dir: &Path,
) -> Result<Option<AuthenticationHandler>, SyncError> {
    let current = settings.load_settings(key)?;

    if current.prefers_oauth() {
        if let Some(token) = oauth_token(settings, secrets, key)? {
            let username = current
                .oauth_username
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_OAUTH_USERNAME.to_string());
            return Ok(Some(AuthenticationHandler::Password {
                username,
                password: token,
            }));
        }
    }

    let Some(private_key) = current.ssh_private_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    let (private_key_path, public_key_path) =
        install_ssh_key(keys_dir, key, private_key, current.ssh_public_key.as_deref())?;

    Ok(Some(AuthenticationHandler::SshKey {
        private_key_path,
        public_key_path,
        passphrase: current.ssh_passphrase.clone().unwrap_or_default(),
    }))
}

/// `<keys_dir>/<key>`
pub fn ssh_key_path(keys_dir: &Path, key: &SettingsKey) -> PathBuf {
    keys_dir.join(key.as_str())
}

/// Write key material to `<keys_dir>/<key>` (+ `.pub`), mode 0600.
pub fn install_ssh_key(
    keys_dir: &Path,
    key: &SettingsKey,
    private_key: &str,
    public_key: Option<&str>,
) -> Result<(PathBuf, Option<PathBuf>), SyncError> {
    std::fs::create_dir_all(keys_dir).map_err(|e| io_err(keys_dir, e))?;

    let private_path = ssh_key_path(keys_dir, key);
    write_private(&private_path, private_key)?;

    let public_path = match public_key.filter(|k| !k.is_empty()) {
        Some(public) => {
            let path = pub_path(&private_path);
            write_private(&path, public)?;
            Some(path)
        }
        None => None,
    };
    Ok((private_path, public_path))
}

/// Delete installed key files; missing files are fine.
pub fn remove_ssh_key(keys_dir: &Path, key: &SettingsKey) -> Result<(), SyncError> {
    let private_path = ssh_key_path(keys_dir, key);
    for path in [pub_path(&private_path), private_path] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
    }
    Ok(())
}

fn pub_path(private_path: &Path) -> PathBuf {
    let mut name = private_path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

fn write_private(path: &Path, contents: &str) -> Result<(), SyncError> {
    std::fs::write(path, contents).map_err(|e| io_err(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| io_err(path, e))?;
    }
    Ok(())
}
