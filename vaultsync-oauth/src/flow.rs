//! Authorization-code flow with PKCE.
//!
//! ```text
//! begin_authorization ──► URL for the browser   (context stored)
//!                                 │
//!               provider redirects to redirect_uri
//!                                 ▼
//! complete_authorization(callback) ──► token     (context consumed)
//! ```
//!
//! At most one context is pending; starting again replaces it. The context is
//! taken before the callback is inspected, so every outcome (success, denial,
//! mismatch, failed exchange) leaves nothing to replay.

use std::sync::{Arc, Mutex, MutexGuard};

use url::Url;

use vaultsync_core::credentials::{set_oauth_token, DEFAULT_OAUTH_PROVIDER, DEFAULT_OAUTH_USERNAME};
use vaultsync_core::{SecretStore, SettingsKey, SettingsStore};

use crate::config::{OAuthConfig, ValidatedConfig};
use crate::error::OAuthError;
use crate::exchange::{HttpTokenExchanger, TokenExchanger, TokenRequest};
use crate::pkce::PkceContext;

pub struct OAuthPkceFlow {
    config: OAuthConfig,
    exchanger: Arc<dyn TokenExchanger>,
    pending: Mutex<Option<PkceContext>>,
}

impl OAuthPkceFlow {
    /// Flow that exchanges codes at `config.token_url` over HTTP.
    pub fn new(config: OAuthConfig) -> Self {
        let token_url = config.token_url.clone().unwrap_or_default();
        Self::with_exchanger(config, Arc::new(HttpTokenExchanger::new(token_url)))
    }

    pub fn with_exchanger(config: OAuthConfig, exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self {
            config,
            exchanger,
            pending: Mutex::new(None),
        }
    }

    /// Create a fresh context and return the URL to open in a browser.
    ///
    /// Configuration is checked first; a missing field creates no context.
    pub fn begin_authorization(&self) -> Result<Url, OAuthError> {
        let config = self.config.validate()?;
        let context = PkceContext::generate(&config.redirect_uri)?;
        let url = authorize_url(&config, &context)?;

        if self.lock().replace(context).is_some() {
            tracing::debug!("replaced a pending authorization");
        }
        tracing::info!("authorization started");
        Ok(url)
    }

    /// Finish the round-trip from the redirect URL.
    ///
    /// `Ok(None)` when no authorization is pending (cancelled or already
    /// consumed).
    pub async fn complete_authorization(&self, callback_url: &str) -> Result<Option<String>, OAuthError> {
        let pending = self.lock().take();
        let Some(context) = pending else {
            tracing::debug!("callback ignored, no pending authorization");
            return Ok(None);
        };

        let request = validate_callback(callback_url, &context)?;
        tracing::info!("exchanging authorization code");

        let exchanger = self.exchanger.clone();
        let token = tokio::task::spawn_blocking(move || exchanger.exchange(&request))
            .await
            .map_err(|err| OAuthError::Worker(err.to_string()))??;

        tracing::info!("authorization completed");
        Ok(Some(token))
    }

    /// [`complete_authorization`](Self::complete_authorization), then make the
    /// token the vault's credential.
    pub async fn complete_for_vault(
        &self,
        callback_url: &str,
        settings: &dyn SettingsStore,
        secrets: &dyn SecretStore,
        key: &SettingsKey,
    ) -> Result<bool, OAuthError> {
        let Some(token) = self.complete_authorization(callback_url).await? else {
            return Ok(false);
        };
        set_oauth_token(
            settings,
            secrets,
            key,
            &token,
            DEFAULT_OAUTH_PROVIDER,
            DEFAULT_OAUTH_USERNAME,
        )?;
        Ok(true)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Drop the pending context; a later callback becomes a no-op.
    pub fn cancel(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<PkceContext>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn authorize_url(config: &ValidatedConfig, context: &PkceContext) -> Result<Url, OAuthError> {
    let mut url = Url::parse(&config.authorize_url)
        .map_err(|e| OAuthError::InvalidCallback(format!("authorize URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scope)
        .append_pair("state", &context.state)
        .append_pair("code_challenge", &context.code_challenge())
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}

/// Checks run in order: provider error, code present, state matches.
fn validate_callback(callback_url: &str, context: &PkceContext) -> Result<TokenRequest, OAuthError> {
    let url = Url::parse(callback_url).map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        tracing::warn!(error = %error, "provider denied authorization");
        return Err(OAuthError::ProviderDenied(error));
    }
    let Some(code) = param("code").filter(|c| !c.is_empty()) else {
        return Err(OAuthError::MissingCode);
    };
    if param("state").as_deref() != Some(context.state.as_str()) {
        tracing::warn!("authorization state mismatch");
        return Err(OAuthError::StateMismatch);
    }

    Ok(TokenRequest {
        code,
        code_verifier: context.code_verifier.clone(),
        redirect_uri: context.redirect_uri.clone(),
    })
}
