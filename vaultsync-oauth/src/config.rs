//! OAuth client settings.

use crate::error::OAuthError;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_SCOPE: &str = "repo";

pub const ENV_CLIENT_ID: &str = "VAULTSYNC_OAUTH_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "VAULTSYNC_OAUTH_REDIRECT_URI";
pub const ENV_TOKEN_URL: &str = "VAULTSYNC_OAUTH_TOKEN_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    /// Backend endpoint that trades the code for a token.
    pub token_url: Option<String>,
    pub authorize_url: String,
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: None,
            token_url: None,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// Checked settings; every field present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub authorize_url: String,
    pub scope: String,
}

impl OAuthConfig {
    /// Read the three client settings from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`OAuthConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            client_id: lookup(ENV_CLIENT_ID),
            redirect_uri: lookup(ENV_REDIRECT_URI),
            token_url: lookup(ENV_TOKEN_URL),
            ..Self::default()
        }
    }

    /// Explicit values win over what is already set.
    pub fn with_overrides(
        mut self,
        client_id: Option<String>,
        redirect_uri: Option<String>,
        token_url: Option<String>,
    ) -> Self {
        self.client_id = client_id.or(self.client_id);
        self.redirect_uri = redirect_uri.or(self.redirect_uri);
        self.token_url = token_url.or(self.token_url);
        self
    }

    /// Fields are checked in order: client id, redirect URI, token URL.
    pub fn validate(&self) -> Result<ValidatedConfig, OAuthError> {
        Ok(ValidatedConfig {
            client_id: required(&self.client_id, "client_id")?,
            redirect_uri: required(&self.redirect_uri, "redirect_uri")?,
            token_url: required(&self.token_url, "token_url")?,
            authorize_url: self.authorize_url.clone(),
            scope: self.scope.clone(),
        })
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, OAuthError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(OAuthError::NotConfigured(field))
}
