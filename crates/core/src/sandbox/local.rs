// crates/core/src/sandbox/local.rs
//! Directory-backed sandbox: each job gets a fresh temporary directory under
//! a shared root, removed on release.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;

use super::{SandboxHandle, SandboxProvider};
use crate::error::{ProvisioningError, ReleaseError, WriteError};
use crate::platform::is_contained;

pub struct LocalSandboxProvider {
    root: PathBuf,
}

impl LocalSandboxProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    async fn acquire(&self) -> Result<Box<dyn SandboxHandle>, ProvisioningError> {
        let io_err = |source| ProvisioningError::Io {
            path: self.root.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let dir = tempfile::Builder::new()
            .prefix("xapp-sandbox-")
            .tempdir_in(&self.root)
            .map_err(io_err)?;
        let id = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(sandbox = %id, root = %self.root.display(), "sandbox acquired");
        Ok(Box::new(LocalSandbox { id, dir }))
    }
}

pub struct LocalSandbox {
    id: String,
    dir: TempDir,
}

impl LocalSandbox {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl SandboxHandle for LocalSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write(&mut self, path: &Path, contents: &str) -> Result<(), WriteError> {
        if path.as_os_str().is_empty() || !is_contained(path) {
            return Err(WriteError::InvalidPath(path.display().to_string()));
        }
        let target = self.dir.path().join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WriteError::io(parent, e))?;
        }
        tokio::fs::write(&target, contents)
            .await
            .map_err(|e| WriteError::io(&target, e))
    }

    async fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        let LocalSandbox { id, dir } = *self;
        let path = dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| ReleaseError::Other(format!("teardown task for {id} failed: {e}")))?
            .map_err(|source| ReleaseError::Io { path, source })
    }
}
