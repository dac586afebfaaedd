//! PKCE verifier/challenge generation (RFC 7636, S256).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::OAuthError;

const VERIFIER_BYTES: usize = 32;

/// Single-use state of one authorization round-trip. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceContext {
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

impl PkceContext {
    /// Fresh verifier and anti-CSRF state for `redirect_uri`.
    pub fn generate(redirect_uri: &str) -> Result<Self, OAuthError> {
        Ok(Self {
            state: new_state(),
            code_verifier: generate_code_verifier()?,
            redirect_uri: redirect_uri.to_string(),
        })
    }

    pub fn code_challenge(&self) -> String {
        code_challenge(&self.code_verifier)
    }
}

/// base64url (unpadded) of 32 random bytes: 43 characters.
pub fn generate_code_verifier() -> Result<String, OAuthError> {
    let mut bytes = [0u8; VERIFIER_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|e| OAuthError::Random(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// `base64url(SHA256(verifier))`
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub fn new_state() -> String {
    uuid::Uuid::new_v4().to_string()
}
