//! Federated-login redirect parsing.
//!
//! The provider appends the outcome to the redirect target, in the fragment
//! for the implicit flow or in the query string otherwise. Both are
//! form-encoded; fragment values win when a key appears in both.

use std::collections::HashMap;

use reqwest::Url;

use crate::error::ErrorCode;
use crate::identity::CallbackTokens;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback url: {0}")]
    InvalidUrl(String),
    #[error("callback carried no access token")]
    MissingToken,
    #[error("federated login denied: {}", denied_reason(.error, .description.as_deref()))]
    Denied { error: String, description: Option<String> },
}

impl ErrorCode for CallbackError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "E_CALLBACK_URL",
            Self::MissingToken => "E_CALLBACK_NO_TOKEN",
            Self::Denied { .. } => "E_CALLBACK_DENIED",
        }
    }
}

fn denied_reason<'a>(error: &'a str, description: Option<&'a str>) -> &'a str {
    description.unwrap_or(error)
}

/// Extract session tokens from a redirect URL.
///
/// # Errors
///
/// `InvalidUrl` if the URL does not parse, `Denied` if the provider reported
/// an error, `MissingToken` if the URL carries neither.
pub fn parse_callback(raw: &str) -> Result<CallbackTokens, CallbackError> {
    let url = Url::parse(raw.trim()).map_err(|e| CallbackError::InvalidUrl(e.to_string()))?;
    tokens_from_params(&callback_params(&url))
}

/// Build tokens from already-decoded parameters (e.g. an HTTP query string).
///
/// # Errors
///
/// Same as [`parse_callback`], minus `InvalidUrl`.
pub fn tokens_from_params(params: &HashMap<String, String>) -> Result<CallbackTokens, CallbackError> {
    let get = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(access_token) = get("access_token") {
        return Ok(CallbackTokens {
            access_token,
            refresh_token: get("refresh_token"),
            expires_in: get("expires_in").and_then(|v| v.parse().ok()),
            token_type: get("token_type"),
        });
    }

    match (get("error"), get("error_description")) {
        (None, None) => Err(CallbackError::MissingToken),
        (error, description) => Err(CallbackError::Denied {
            error: error.unwrap_or_else(|| "unknown_error".to_owned()),
            description,
        }),
    }
}

fn callback_params(url: &Url) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        // Reuse the query decoder for the fragment.
        let mut probe = url.clone();
        probe.set_fragment(None);
        probe.set_query(Some(fragment));
        params.extend(probe.query_pairs().into_owned());
    }
    params
}

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;
