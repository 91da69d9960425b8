//! Hosted auth API client (GoTrue wire protocol).
//!
//! Thin HTTP wrapper over `/auth/v1`. Response parsing lives in pure
//! functions so it can be tested without a server. The client caches one
//! session per process, mirroring how the mobile SDKs behave. A cached user
//! always comes with its access token: an account awaiting email
//! confirmation is returned to the caller but never cached.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::Url;

use super::{CallbackTokens, IdentityError, IdentityProvider, OAuthProvider, ProviderUser};
use crate::config::HttpTimeouts;

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone)]
struct ActiveSession {
    access_token: String,
    user: ProviderUser,
}

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    redirect_url: Option<String>,
    session: Mutex<Option<ActiveSession>>,
}

impl GoTrueClient {
    /// Build a client for the auth API rooted at `{base_url}/auth/v1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        api_key: String,
        redirect_url: Option<String>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            redirect_url,
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the cached session wholesale; a new credential never inherits
    /// the previous user's token. Returns the user the call resolved to.
    fn store(&self, outcome: AuthOutcome) -> Result<ProviderUser, IdentityError> {
        let user = outcome.user.ok_or(IdentityError::MissingUserId)?;
        *self.cache() = outcome
            .access_token
            .map(|access_token| ActiveSession { access_token, user: user.clone() });
        Ok(user)
    }

    async fn post_credentials(&self, url: &str, email: &str, password: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, IdentityError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| IdentityError::Request(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(IdentityError::Rejected { status, message: parse_error_message(status, &text) });
    }
    Ok(text)
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, IdentityError> {
        let body = self
            .post_credentials(&self.endpoint("signup"), email, password)
            .await?;
        let outcome = parse_auth_response(&body)?;
        tracing::debug!(has_session = outcome.access_token.is_some(), "sign-up accepted");
        self.store(outcome)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, IdentityError> {
        let body = self
            .post_credentials(&self.endpoint("token?grant_type=password"), email, password)
            .await?;
        let outcome = parse_auth_response(&body)?;
        if outcome.access_token.is_none() {
            return Err(IdentityError::Parse("token response carried no access_token".into()));
        }
        self.store(outcome)
    }

    async fn authorize_url(&self, provider: OAuthProvider) -> Result<String, IdentityError> {
        build_authorize_url(&self.base_url, provider, self.redirect_url.as_deref())
    }

    async fn establish_session(&self, tokens: &CallbackTokens) -> Result<ProviderUser, IdentityError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        let body = read_body(response).await?;
        let user: ProviderUser = serde_json::from_str(&body).map_err(|e| IdentityError::Parse(e.to_string()))?;
        self.store(AuthOutcome { access_token: Some(tokens.access_token.clone()), user: Some(user) })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(ActiveSession { access_token: token, .. }) = self.cache().take() else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        read_body(response).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<ProviderUser>, IdentityError> {
        Ok(self.cache().as_ref().map(|session| session.user.clone()))
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// What a sign-up or token call handed back.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct AuthOutcome {
    pub access_token: Option<String>,
    pub user: Option<ProviderUser>,
}

#[derive(serde::Deserialize)]
struct SessionWire {
    access_token: Option<String>,
    user: Option<ProviderUser>,
}

/// Parse a sign-up/token response.
///
/// A confirmed sign-up (or sign-in) returns a session wrapping `user`. A
/// sign-up still waiting on email confirmation returns the bare user object.
pub(crate) fn parse_auth_response(json: &str) -> Result<AuthOutcome, IdentityError> {
    let wire: SessionWire = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    if wire.access_token.is_some() || wire.user.is_some() {
        return Ok(AuthOutcome { access_token: wire.access_token, user: wire.user });
    }

    let user: ProviderUser = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(AuthOutcome { access_token: None, user: Some(user) })
}

/// Pick the most descriptive message out of an error body.
pub(crate) fn parse_error_message(status: u16, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return if body.trim().is_empty() { format!("auth request failed with status {status}") } else { body.to_owned() };
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map_or_else(|| format!("auth request failed with status {status}"), str::to_owned)
}

/// Build `{base}/auth/v1/authorize?provider=..[&redirect_to=..]`.
pub(crate) fn build_authorize_url(
    base_url: &str,
    provider: OAuthProvider,
    redirect_url: Option<&str>,
) -> Result<String, IdentityError> {
    let endpoint = format!("{}/auth/v1/authorize", base_url.trim_end_matches('/'));
    let mut params = vec![("provider", provider.as_str())];
    if let Some(redirect) = redirect_url {
        params.push(("redirect_to", redirect));
    }
    let url = Url::parse_with_params(&endpoint, &params).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(url.into())
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
