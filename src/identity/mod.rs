//! Identity provider — the external credential and session authority.
//!
//! DESIGN
//! ======
//! The session service only ever sees the `IdentityProvider` trait. The
//! concrete `GoTrueClient` talks to a hosted auth API; tests swap in an
//! in-memory double from `state::test_helpers`.
//!
//! Passwords and tokens never leave the provider client. `current_user`
//! answers from the client's cached session, the same way the hosted SDKs do.

pub mod gotrue;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity provider calls.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider rejected the request (bad credentials, duplicate email, ...).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The provider completed the call but no user identifier is available.
    #[error("user id not found")]
    MissingUserId,

    /// The requested federated provider is not supported.
    #[error("unsupported oauth provider: {0}")]
    UnsupportedProvider(String),

    /// The HTTP request to the provider failed (timeout, unreachable, ...).
    #[error("identity request failed: {0}")]
    Request(String),

    /// The provider response body could not be decoded.
    #[error("identity response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for IdentityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "E_IDENTITY_REJECTED",
            Self::MissingUserId => "E_IDENTITY_MISSING_USER",
            Self::UnsupportedProvider(_) => "E_IDENTITY_PROVIDER",
            Self::Request(_) => "E_IDENTITY_REQUEST",
            Self::Parse(_) => "E_IDENTITY_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Rejected { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Federated login providers this service knows how to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    GitHub,
}

impl OAuthProvider {
    /// Provider name as the hosted auth API spells it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            other => Err(IdentityError::UnsupportedProvider(other.to_owned())),
        }
    }
}

/// The signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,
}

impl ProviderUser {
    /// String value of a metadata field, if present and non-null.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.user_metadata.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Tokens delivered to the redirect target after a federated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Contract of the external identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password credential and return its user.
    ///
    /// A session is opened only if the provider issued one; an account still
    /// awaiting email confirmation has a user but no session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, IdentityError>;

    /// Validate an email/password credential, open a session, and return
    /// the signed-in user.
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, IdentityError>;

    /// Authorization URL the user agent must open to start a federated login.
    async fn authorize_url(&self, provider: OAuthProvider) -> Result<String, IdentityError>;

    /// Adopt the session carried by a federated-login redirect and return
    /// its user.
    async fn establish_session(&self, tokens: &CallbackTokens) -> Result<ProviderUser, IdentityError>;

    /// End the current session. The local session is dropped even on failure.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// The signed-in user, or `None` when there is no session.
    async fn current_user(&self) -> Result<Option<ProviderUser>, IdentityError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
