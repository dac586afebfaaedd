//! Error types for vaultsync-oauth.

use thiserror::Error;

use vaultsync_core::CoreError;

/// Every failure of an authorization attempt. None is retried; the user has
/// to start a new attempt.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The provider redirected back with an `error` parameter.
    #[error("{0}")]
    ProviderDenied(String),

    #[error("Missing authorization code")]
    MissingCode,

    #[error("State mismatch, please retry")]
    StateMismatch,

    /// The backend refused the code or answered without a token.
    #[error("{0}")]
    TokenExchangeFailed(String),

    /// A required client setting is absent.
    #[error("OAuth not configured: missing {0}")]
    NotConfigured(&'static str),

    /// The callback URL could not be parsed.
    #[error("invalid callback URL: {0}")]
    InvalidCallback(String),

    /// The system random source failed while generating the verifier.
    #[error("random source unavailable: {0}")]
    Random(String),

    #[error("settings error: {0}")]
    Core(#[from] CoreError),

    #[error("token exchange task failed: {0}")]
    Worker(String),
}
