//! Service configuration parsed from environment variables.
//!
//! Read once at startup (after `.env` is loaded) and never revisited.

use crate::error::ErrorCode;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PROFILE_TABLE: &str = "Account";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_HTTP_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS }
    }
}

/// Typed startup configuration.
///
/// The API key is excluded from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Base URL of the hosted backend (auth + table API).
    pub supabase_url: String,
    pub supabase_key: String,
    /// Where the provider sends the user agent after a federated login.
    pub redirect_url: Option<String>,
    pub profile_table: String,
    /// When set, profiles live in this Postgres database instead of the table API.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub timeouts: HttpTimeouts,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("supabase_url", &self.supabase_url)
            .field("redirect_url", &self.redirect_url)
            .field("profile_table", &self.profile_table)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_KEY`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `OAUTH_REDIRECT_URL`: provider default when absent
    /// - `PROFILE_TABLE`: default `Account`
    /// - `DATABASE_URL`: use Postgres directly for profiles
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `HTTP_REQUEST_TIMEOUT_SECS`: default 30
    /// - `HTTP_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let supabase_url = get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let supabase_key = get("SUPABASE_KEY").ok_or(ConfigError::Missing("SUPABASE_KEY"))?;
        if !(supabase_url.starts_with("http://") || supabase_url.starts_with("https://")) {
            return Err(ConfigError::Invalid { var: "SUPABASE_URL", value: supabase_url });
        }

        Ok(Self {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            supabase_url: supabase_url.trim_end_matches('/').to_owned(),
            supabase_key,
            redirect_url: get("OAUTH_REDIRECT_URL"),
            profile_table: get("PROFILE_TABLE").unwrap_or_else(|| DEFAULT_PROFILE_TABLE.to_owned()),
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_DB_MAX_CONNECTIONS)?,
            timeouts: HttpTimeouts {
                request_secs: parse_or(
                    "HTTP_REQUEST_TIMEOUT_SECS",
                    get("HTTP_REQUEST_TIMEOUT_SECS"),
                    DEFAULT_HTTP_REQUEST_TIMEOUT_SECS,
                )?,
                connect_secs: parse_or(
                    "HTTP_CONNECT_TIMEOUT_SECS",
                    get("HTTP_CONNECT_TIMEOUT_SECS"),
                    DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
                )?,
            },
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
