// crates/core/src/sandbox/mod.rs
//! Sandbox collaborator: an isolated filesystem a build job writes into.

pub mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{ProvisioningError, ReleaseError, WriteError};

pub use local::LocalSandboxProvider;

/// Hands out sandboxes, one per build job.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn SandboxHandle>, ProvisioningError>;
}

/// One acquired sandbox, exclusively owned by the job that acquired it.
///
/// `release` consumes the handle, so a sandbox can be released at most once.
#[async_trait]
pub trait SandboxHandle: Send {
    /// Identifier for logs and progress messages.
    fn id(&self) -> &str;

    /// Write `contents` to `path`, relative to the sandbox root, creating
    /// parent directories. Absolute or escaping paths are rejected.
    async fn write(&mut self, path: &Path, contents: &str) -> Result<(), WriteError>;

    async fn release(self: Box<Self>) -> Result<(), ReleaseError>;
}
