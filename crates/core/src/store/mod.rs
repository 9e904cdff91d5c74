// crates/core/src/store/mod.rs
//! Record storage collaborator for project metadata.
//!
//! Opaque key-value persistence with no transactional contract. The build
//! core only consults it to check that a project exists.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::project::{NewProject, Project};

pub use memory::MemoryProjectStore;
pub use supabase::{SupabaseConfig, SupabaseProjectStore};

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create(&self, project: NewProject) -> Result<Project, StoreError>;

    async fn list(&self) -> Result<Vec<Project>, StoreError>;

    /// Default implementation scans `list`; stores with keyed lookups override it.
    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.list().await?.iter().any(|p| p.id == id))
    }

    /// Backend name for logging/display.
    fn name(&self) -> &str;
}
