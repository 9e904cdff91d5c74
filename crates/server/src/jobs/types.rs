// crates/server/src/jobs/types.rs
//! Types for build jobs and their submission.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;
use xapp_core::{BuildError, PlatformLayout, ProjectId, DEFAULT_PLATFORM};

/// Execution context for one build attempt.
///
/// The sandbox handle is not stored here: the pipeline acquires it during
/// Provisioning and owns it until release.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub prompt: String,
    /// Normalized platform selector, e.g. `flutter`.
    pub platform: String,
    pub layout: PlatformLayout,
}

impl BuildJob {
    pub fn new(
        project_id: ProjectId,
        prompt: impl Into<String>,
        platform: impl Into<String>,
        layout: PlatformLayout,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            prompt: prompt.into(),
            platform: platform.into(),
            layout,
        }
    }
}

/// Body of `POST /api/projects/{id}/build`.
#[derive(Debug, Clone, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub prompt: String,
    #[serde(default = "default_platform", alias = "project_type")]
    pub project_type: String,
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

/// Immediate acknowledgement of an accepted build. Progress is only ever
/// observed on the live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct BuildAccepted {
    pub message: String,
    pub project_id: ProjectId,
    #[ts(type = "string")]
    pub job_id: Uuid,
}

impl BuildAccepted {
    pub fn for_job(job: &BuildJob) -> Self {
        Self {
            message: "Build started".to_string(),
            project_id: job.project_id.clone(),
            job_id: job.id,
        }
    }
}

/// How a pipeline run ended. Returned by value and logged by the supervisor;
/// never surfaced to the submitter.
#[derive(Debug)]
pub enum BuildOutcome {
    Finished { files_written: usize },
    Failed(BuildError),
    /// A stage panicked; the sandbox was still released.
    Aborted,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Finished { .. })
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            BuildOutcome::Finished { .. } => "finished",
            BuildOutcome::Failed(_) => "failed",
            BuildOutcome::Aborted => "aborted",
        }
    }
}
