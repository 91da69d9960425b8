//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The UI is an external collaborator: it invokes session operations over
//! these JSON routes and observes the session status by polling or over a
//! websocket.

pub mod auth;
pub mod status;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/callback", post(auth::callback_url))
        .route("/api/auth/oauth/complete", post(auth::oauth_complete))
        .route("/auth/callback", get(auth::callback_query))
        .route("/auth/{provider}", get(auth::oauth_start))
        .route("/api/auth/status", get(status::current))
        .route("/api/auth/status/reset", post(status::reset))
        .route("/api/auth/status/ws", get(status::watch_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
