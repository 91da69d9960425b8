//! Profile table over the hosted REST table API (`/rest/v1/{table}`).

use std::time::Duration;

use super::{Profile, ProfileStore, ProfileStoreError, single_row};
use crate::config::HttpTimeouts;

pub struct PostgrestProfileStore {
    http: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl PostgrestProfileStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, table: &str, api_key: String, timeouts: HttpTimeouts) -> Result<Self, ProfileStoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ProfileStoreError::Request(e.to_string()))?;
        Ok(Self { http, table_url: table_url(base_url, table), api_key })
    }
}

pub(crate) fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

/// Map an insert status. 409 is the table API's unique-violation answer.
pub(crate) fn insert_status(status: u16, body: String, id: &str) -> Result<(), ProfileStoreError> {
    match status {
        200..=299 => Ok(()),
        409 => Err(ProfileStoreError::Conflict(id.to_owned())),
        _ => Err(ProfileStoreError::Response { status, body }),
    }
}

pub(crate) fn parse_rows(json: &str) -> Result<Option<Profile>, ProfileStoreError> {
    let rows: Vec<Profile> = serde_json::from_str(json).map_err(|e| ProfileStoreError::Parse(e.to_string()))?;
    single_row(rows)
}

#[async_trait::async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        let response = self
            .http
            .post(&self.table_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await
            .map_err(|e| ProfileStoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProfileStoreError::Request(e.to_string()))?;
        insert_status(status, body, &profile.id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileStoreError> {
        let filter = format!("eq.{id}");
        let response = self
            .http
            .get(&self.table_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await
            .map_err(|e| ProfileStoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProfileStoreError::Request(e.to_string()))?;
        if status != 200 {
            return Err(ProfileStoreError::Response { status, body: text });
        }
        parse_rows(&text)
    }
}

#[cfg(test)]
#[path = "postgrest_test.rs"]
mod tests;
