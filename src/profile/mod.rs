//! Profile store — application-level user data kept apart from credentials.
//!
//! DESIGN
//! ======
//! One row per provider-assigned identifier. The session service only needs
//! `insert` and `get_by_id`; both are remote calls whose transport failures
//! collapse into `ProfileStoreError`.

pub mod postgres;
pub mod postgrest;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Profile row. Field names match the `Account` table columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phonenumber: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("profile not found for user {0}")]
    NotFound(String),
    #[error("profile already exists for user {0}")]
    Conflict(String),
    #[error("expected one profile row, got {count}")]
    UnexpectedRowCount { count: usize },
    #[error("profile request failed: {0}")]
    Request(String),
    #[error("profile response error: status {status}: {body}")]
    Response { status: u16, body: String },
    #[error("profile response parse failed: {0}")]
    Parse(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ErrorCode for ProfileStoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::Conflict(_) => "E_PROFILE_CONFLICT",
            Self::UnexpectedRowCount { .. } => "E_PROFILE_ROW_COUNT",
            Self::Request(_) => "E_PROFILE_REQUEST",
            Self::Response { .. } => "E_PROFILE_RESPONSE",
            Self::Parse(_) => "E_PROFILE_PARSE",
            Self::Db(_) => "E_PROFILE_DB",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 500..=599, .. })
    }
}

/// Contract of the external profile table.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a new row. A row with the same `id` yields `Conflict`.
    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError>;

    /// Fetch the row for `id`; `None` when there is none.
    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileStoreError>;
}

/// Collapse a select result into at most one row.
pub(crate) fn single_row(mut rows: Vec<Profile>) -> Result<Option<Profile>, ProfileStoreError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(ProfileStoreError::UnexpectedRowCount { count }),
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
