//! Profile table stored directly in Postgres.
//!
//! Used when `DATABASE_URL` is configured. The table name is interpolated as
//! a quoted identifier, so it is validated up front.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{Profile, ProfileStore, ProfileStoreError, single_row};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgProfileStore {
    pool: PgPool,
    insert_sql: String,
    select_sql: String,
}

impl PgProfileStore {
    /// Returns `None` if `table` is not a plain identifier.
    #[must_use]
    pub fn new(pool: PgPool, table: &str) -> Option<Self> {
        if !is_plain_identifier(table) {
            return None;
        }
        Some(Self {
            pool,
            insert_sql: format!(
                r#"INSERT INTO "{table}" (id, firstname, lastname, email, phonenumber) VALUES ($1, $2, $3, $4, $5)"#
            ),
            // LIMIT 2 is enough to detect a duplicate without reading the table.
            select_sql: format!(
                r#"SELECT id, firstname, lastname, email, phonenumber FROM "{table}" WHERE id = $1 LIMIT 2"#
            ),
        })
    }
}

pub(crate) fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        let result = sqlx::query(&self.insert_sql)
            .bind(&profile.id)
            .bind(&profile.firstname)
            .bind(&profile.lastname)
            .bind(&profile.email)
            .bind(&profile.phonenumber)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(ProfileStoreError::Conflict(profile.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileStoreError> {
        let rows = sqlx::query(&self.select_sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let profiles = rows
            .iter()
            .map(profile_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        single_row(profiles)
    }
}

/// Decode one row; a column of the wrong type is an error, not a panic.
fn profile_from_row(row: &PgRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        firstname: row.try_get("firstname")?,
        lastname: row.try_get("lastname")?,
        email: row.try_get("email")?,
        phonenumber: row.try_get("phonenumber")?,
    })
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
