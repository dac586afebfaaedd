//! Backend token exchange.
//!
//! `POST <token_url>` with `{code, code_verifier, redirect_uri}` as JSON.
//! Any 2xx carrying a non-empty `access_token` succeeds; everything else is a
//! [`OAuthError::TokenExchangeFailed`] with the most specific message the
//! backend gave.

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OAuthError;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_HTTP_FAILURE: &str = "Unable to exchange OAuth token via backend";
const FALLBACK_NO_TOKEN: &str = "OAuth token not received from backend";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[derive(Debug, Default, Deserialize)]
struct BackendTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl BackendTokenResponse {
    fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| self.error.clone().filter(|m| !m.is_empty()))
    }
}

/// Trades an authorization code for an access token. Blocking.
pub trait TokenExchanger: Send + Sync {
    fn exchange(&self, request: &TokenRequest) -> Result<String, OAuthError>;
}

/// [`TokenExchanger`] over a blocking `ureq` agent.
pub struct HttpTokenExchanger {
    agent: ureq::Agent,
    token_url: String,
}

impl HttpTokenExchanger {
    pub fn new(token_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(EXCHANGE_TIMEOUT).build();
        Self {
            agent,
            token_url: token_url.into(),
        }
    }
}

impl TokenExchanger for HttpTokenExchanger {
    fn exchange(&self, request: &TokenRequest) -> Result<String, OAuthError> {
        let sent = self
            .agent
            .post(&self.token_url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
            .send_json(request);

        let (status, response) = match sent {
            Ok(response) => (response.status(), response),
            Err(ureq::Error::Status(code, response)) => (code, response),
            Err(ureq::Error::Transport(transport)) => {
                tracing::warn!(error = %transport, "token backend unreachable");
                return Err(OAuthError::TokenExchangeFailed(transport.to_string()));
            }
        };

        let mut body = String::new();
        if let Err(err) = response.into_reader().read_to_string(&mut body) {
            tracing::debug!(error = %err, "token backend body unreadable");
        }
        interpret_token_response(status, &body)
    }
}

/// Map a backend answer to a token or a failure message.
///
/// Non-2xx: the JSON `error_description`/`error`, else the raw body, else a
/// generic message. 2xx: the `access_token`, else `error_description`, else
/// `error`, else a generic message.
pub fn interpret_token_response(status: u16, body: &str) -> Result<String, OAuthError> {
    let parsed = serde_json::from_str::<BackendTokenResponse>(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .as_ref()
            .and_then(BackendTokenResponse::message)
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| FALLBACK_HTTP_FAILURE.to_string());
        tracing::warn!(status, "token backend rejected the code");
        return Err(OAuthError::TokenExchangeFailed(message));
    }

    let parsed = parsed.unwrap_or_default();
    match parsed.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Ok(token.to_string()),
        None => Err(OAuthError::TokenExchangeFailed(
            parsed.message().unwrap_or_else(|| FALLBACK_NO_TOKEN.to_string()),
        )),
    }
}
