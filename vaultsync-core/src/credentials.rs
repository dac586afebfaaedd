//! OAuth and SSH credential bookkeeping for a vault.
//!
//! The OAuth token lives both in the vault settings and in the secret store;
//! whichever has it is used to repair the other. OAuth and SSH-key auth are
//! mutually exclusive: storing one clears the other.

use crate::error::CoreError;
use crate::secret::{oauth_account, SecretStore};
use crate::settings::SettingsStore;
use crate::types::{AuthMode, SettingsKey};

pub const DEFAULT_OAUTH_PROVIDER: &str = "github";
pub const DEFAULT_OAUTH_USERNAME: &str = "x-access-token";

/// Current OAuth token for `key`, if any.
///
/// A token found only in the secret store is written back into the settings
/// together with default provider/username and `auth_mode = oauth` when those
/// are unset. A vault in SSH-key mode never picks up a stored token.
pub fn oauth_token(
    store: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
) -> Result<Option<String>, CoreError> {
    let mut settings = store.load_settings(key)?;

    if let Some(token) = settings.oauth_access_token.clone().filter(|t| !t.is_empty()) {
        if let Err(err) = secrets.save(&oauth_account(key), &token) {
            tracing::warn!(error = %err, "failed to mirror OAuth token into secret store");
        }
        return Ok(Some(token));
    }
    if settings.auth_mode == Some(AuthMode::SshKey) {
        return Ok(None);
    }

    let Some(token) = secrets.read(&oauth_account(key))?.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    settings.oauth_access_token = Some(token.clone());
    settings.auth_mode.get_or_insert(AuthMode::OAuth);
    settings
        .oauth_provider
        .get_or_insert_with(|| DEFAULT_OAUTH_PROVIDER.to_string());
    settings
        .oauth_username
        .get_or_insert_with(|| DEFAULT_OAUTH_USERNAME.to_string());
    store.save_settings(key, &settings)?;
    Ok(Some(token))
}

/// Make `token` the vault's credential and drop any SSH key material.
pub fn set_oauth_token(
    store: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
    token: &str,
    provider: &str,
    username: &str,
) -> Result<(), CoreError> {
    let mut settings = store.load_settings(key)?;
    settings.auth_mode = Some(AuthMode::OAuth);
    settings.oauth_provider = Some(provider.to_string());
    settings.oauth_access_token = Some(token.to_string());
    settings.oauth_username = Some(username.to_string());
    settings.clear_ssh_key();

    secrets.save(&oauth_account(key), token)?;
    store.save_settings(key, &settings)
}

/// Forget every OAuth field and the stored secret.
pub fn clear_oauth_token(
    store: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
) -> Result<(), CoreError> {
    let mut settings = store.load_settings(key)?;
    settings.oauth_access_token = None;
    settings.oauth_provider = None;
    settings.oauth_username = None;
    settings.auth_mode = None;

    secrets.delete(&oauth_account(key))?;
    store.save_settings(key, &settings)
}

pub fn is_oauth_authorized(
    store: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
) -> Result<bool, CoreError> {
    Ok(oauth_token(store, secrets, key)?.is_some())
}

/// Configure SSH key auth and drop every OAuth field and the stored secret.
pub fn set_ssh_key(
    store: &dyn SettingsStore,
    secrets: &dyn SecretStore,
    key: &SettingsKey,
    private_key: &str,
    public_key: Option<&str>,
    passphrase: Option<&str>,
) -> Result<(), CoreError> {
    let mut settings = store.load_settings(key)?;
    settings.auth_mode = Some(AuthMode::SshKey);
    settings.ssh_private_key = Some(private_key.to_string());
    settings.ssh_public_key = public_key.map(str::to_string);
    settings.ssh_passphrase = passphrase.map(str::to_string);
    settings.oauth_access_token = None;
    settings.oauth_provider = None;
    settings.oauth_username = None;

    secrets.delete(&oauth_account(key))?;
    store.save_settings(key, &settings)
}
