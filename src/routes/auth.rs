//! Auth routes: credential sign-up and sign-in, federated login, sign-out.
//!
//! Mutating operations run through [`run_detached`] so a client that hangs
//! up mid-request cannot leave the status stuck at `Loading`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ErrorCode;
use crate::identity::{IdentityError, OAuthProvider};
use crate::profile::ProfileStoreError;
use crate::services::callback;
use crate::services::session::{Registration, SessionError, run_detached};
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

pub(crate) fn session_error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Identity(IdentityError::UnsupportedProvider(_)) => StatusCode::NOT_FOUND,
        SessionError::Identity(
            IdentityError::Request(_) | IdentityError::Parse(_) | IdentityError::HttpClientBuild(_),
        ) => StatusCode::BAD_GATEWAY,
        SessionError::Identity(_) => StatusCode::UNAUTHORIZED,
        SessionError::ProfileStore(ProfileStoreError::Conflict(_)) => StatusCode::CONFLICT,
        SessionError::ProfileStore(ProfileStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        SessionError::ProfileStore(_) => StatusCode::BAD_GATEWAY,
        SessionError::Callback(_) => StatusCode::BAD_REQUEST,
        SessionError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: &SessionError) -> Response {
    let body = ErrorBody { code: err.error_code(), message: err.to_string(), retryable: err.retryable() };
    (session_error_status(err), Json(body)).into_response()
}

// =============================================================================
// CREDENTIALS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// `POST /api/auth/register` — create a credential and its profile.
pub async fn register(State(state): State<AppState>, Json(registration): Json<Registration>) -> Response {
    let session = state.session.clone();
    match run_detached(async move { session.register(registration).await }).await {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/auth/login` — sign in with email and password.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let session = state.session.clone();
    match run_detached(async move { session.authenticate(&body.email, &body.password).await }).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// FEDERATED LOGIN
// =============================================================================

/// `GET /auth/{provider}` — redirect to the provider's authorization page.
pub async fn oauth_start(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let provider: OAuthProvider = match provider.parse() {
        Ok(p) => p,
        Err(e) => return error_response(&SessionError::Identity(e)),
    };
    let launched = state
        .session
        .begin_federated_login(provider, |url| info!(%provider, url, "redirecting to provider"))
        .await;
    match launched {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /auth/callback` — provider redirect with the outcome in the query.
pub async fn callback_query(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let session = state.session.clone();
    let parsed = callback::tokens_from_params(&params);
    match run_detached(async move { session.finish_redirect(parsed).await }).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/auth/oauth/complete` — reconcile the profile for a federated
/// session that is already established, e.g. to retry after a store failure.
pub async fn oauth_complete(State(state): State<AppState>) -> Response {
    let session = state.session.clone();
    match run_detached(async move { session.complete_federated_login().await }).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct CallbackUrl {
    url: String,
}

/// `POST /api/auth/callback` — full redirect URL captured by the client,
/// including a fragment the browser never sends to the server.
pub async fn callback_url(State(state): State<AppState>, Json(body): Json<CallbackUrl>) -> Response {
    let session = state.session.clone();
    match run_detached(async move { session.handle_redirect(&body.url).await }).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// `POST /api/auth/logout` — end the session and reset the status.
pub async fn logout(State(state): State<AppState>) -> Response {
    let session = state.session.clone();
    let ended = run_detached(async move { session.end_session(|| info!("signed out")).await }).await;
    match ended {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/auth/me` — profile of the signed-in user.
pub async fn me(State(state): State<AppState>) -> Response {
    match state.session.fetch_current_profile().await {
        Some(profile) => Json(profile).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
