// crates/core/src/lib.rs
//! Domain types and external collaborators for the xapp build service.

pub mod artifact;
pub mod error;
pub mod event;
pub mod llm;
pub mod platform;
pub mod project;
pub mod sandbox;
pub mod store;

pub use artifact::{Artifact, ArtifactFile};
pub use error::*;
pub use event::{BuildEvent, BuildStage, EventKind};
pub use platform::{PlatformLayout, PlatformTable, PlatformTableError, DEFAULT_PLATFORM};
pub use project::{NewProject, Project, ProjectId};
