// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised before a build job is created.
///
/// This is the only error kind surfaced synchronously to a build submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid project id '{id}': {reason}")]
    InvalidProjectId { id: String, reason: &'static str },

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),
}

/// The sandbox could not be acquired.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Sandbox unavailable: {0}")]
    Unavailable(String),

    #[error("IO error creating sandbox under {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The generation collaborator failed or returned unusable content.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generator returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse generator response: {0}")]
    ParseFailed(String),

    #[error("Generator returned no usable content")]
    EmptyArtifact,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

/// Materializing the artifact into the sandbox failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Refusing to write outside the sandbox: {0}")]
    InvalidPath(String),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A subscriber's channel is broken. Never reaches a build job; it only
/// triggers unsubscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Subscriber {subscriber_id} is no longer receiving")]
pub struct DeliveryError {
    pub subscriber_id: u64,
}

/// Tearing down a sandbox failed. Logged and discarded, never allowed to
/// replace the job's outcome.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("IO error removing sandbox {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sandbox teardown failed: {0}")]
    Other(String),
}

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Writing failed: {0}")]
    Write(#[from] WriteError),
}

impl BuildError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Provisioning(_) => "provisioning",
            BuildError::Generation(_) => "generation",
            BuildError::Write(_) => "write",
        }
    }
}

/// Errors from the project record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Store returned an unexpected payload: {0}")]
    InvalidResponse(String),
}

impl WriteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
