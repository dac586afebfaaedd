//! # vaultsync-oauth
//!
//! OAuth2 authorization-code flow with PKCE for git remotes served over
//! `https://`. [`OAuthPkceFlow::begin_authorization`] yields the browser URL;
//! [`OAuthPkceFlow::complete_authorization`] validates the redirect and trades
//! the code for a token at a backend endpoint.

pub mod config;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod pkce;

pub use config::{OAuthConfig, ValidatedConfig};
pub use error::OAuthError;
pub use exchange::{interpret_token_response, HttpTokenExchanger, TokenExchanger, TokenRequest};
pub use flow::OAuthPkceFlow;
pub use pkce::{code_challenge, PkceContext};
