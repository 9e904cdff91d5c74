// crates/core/src/store/supabase.rs
//! Supabase (PostgREST) project store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use super::ProjectStore;
use crate::error::StoreError;
use crate::project::{NewProject, Project};

/// Table holding project records.
pub const PROJECTS_TABLE: &str = "projects";

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"****")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(15),
        }
    }
}

pub struct SupabaseProjectStore {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseProjectStore {
    pub fn new(config: SupabaseConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{PROJECTS_TABLE}", self.config.url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    async fn rows(response: Response) -> Result<Vec<Project>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProjectStore for SupabaseProjectStore {
    async fn create(&self, project: NewProject) -> Result<Project, StoreError> {
        debug!(name = %project.name, "inserting project record");
        let response = self
            .authed(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&project)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidResponse("insert returned no rows".into()))
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Self::rows(response).await
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(!Self::rows(response).await?.is_empty())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
