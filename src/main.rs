mod config;
mod db;
mod error;
mod identity;
mod profile;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use config::{AppConfig, ConfigError};
use identity::IdentityError;
use identity::gotrue::GoTrueClient;
use profile::postgres::PgProfileStore;
use profile::postgrest::PostgrestProfileStore;
use profile::{ProfileStore, ProfileStoreError};
use services::session::SessionService;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Profiles(#[from] ProfileStoreError),
    #[error("database init failed: {0}")]
    Db(#[from] sqlx::Error),
    #[error("PROFILE_TABLE {0:?} is not a plain identifier")]
    Table(String),
    #[error("failed to bind: {0}")]
    Bind(std::io::Error),
    #[error("server failed: {0}")]
    Serve(std::io::Error),
}

async fn profile_store(config: &AppConfig) -> Result<Arc<dyn ProfileStore>, StartupError> {
    if let Some(database_url) = &config.database_url {
        let pool = db::init_pool(database_url, config.db_max_connections).await?;
        let store = PgProfileStore::new(pool, &config.profile_table)
            .ok_or_else(|| StartupError::Table(config.profile_table.clone()))?;
        tracing::info!(table = %config.profile_table, "profiles: postgres");
        return Ok(Arc::new(store));
    }
    let store = PostgrestProfileStore::new(
        &config.supabase_url,
        &config.profile_table,
        config.supabase_key.clone(),
        config.timeouts,
    )?;
    tracing::info!(table = %config.profile_table, "profiles: postgrest");
    Ok(Arc::new(store))
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "config loaded");

    let identity = GoTrueClient::new(
        &config.supabase_url,
        config.supabase_key.clone(),
        config.redirect_url.clone(),
        config.timeouts,
    )?;
    let profiles = profile_store(&config).await?;
    let state = state::AppState::new(SessionService::new(Arc::new(identity), profiles));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(StartupError::Bind)?;

    tracing::info!(port = config.port, "account-session listening");
    axum::serve(listener, app).await.map_err(StartupError::Serve)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "startup failed");
        std::process::exit(1);
    }
}
