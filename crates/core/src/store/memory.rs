// crates/core/src/store/memory.rs
//! In-process project store used when no managed datastore is configured.

use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::ProjectStore;
use crate::error::StoreError;
use crate::project::{NewProject, Project};

#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<Vec<Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: NewProject) -> Result<Project, StoreError> {
        let record = Project {
            id: Uuid::new_v4().to_string(),
            name: project.name,
            description: project.description,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        match self.projects.write() {
            Ok(mut projects) => projects.push(record.clone()),
            Err(e) => return Err(StoreError::Request(format!("store lock poisoned: {e}"))),
        }
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        self.projects
            .read()
            .map(|p| p.clone())
            .map_err(|e| StoreError::Request(format!("store lock poisoned: {e}")))
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.projects
            .read()
            .map(|p| p.iter().any(|p| p.id == id))
            .map_err(|e| StoreError::Request(format!("store lock poisoned: {e}")))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
