// crates/core/src/event.rs
//! Build progress events and their wire format.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::project::ProjectId;

/// Stage marker carried by every build event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Started,
    Provisioning,
    Generating,
    Writing,
    Finished,
    #[serde(rename = "error")]
    Failed,
    ProcessFinished,
}

impl BuildStage {
    /// Finished or Failed: no stage transition follows either.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStage::Finished | BuildStage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStage::Started => "started",
            BuildStage::Provisioning => "provisioning",
            BuildStage::Generating => "generating",
            BuildStage::Writing => "writing",
            BuildStage::Finished => "finished",
            BuildStage::Failed => "error",
            BuildStage::ProcessFinished => "process_finished",
        }
    }
}

/// Whether an event marks entry into its stage or is extra detail within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Transition,
    Info,
}

/// One immutable progress message for a single build job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    #[ts(type = "string")]
    pub job_id: Uuid,
    pub project_id: ProjectId,
    pub stage: BuildStage,
    pub kind: EventKind,
    pub message: String,
    pub timestamp: String,
}

impl BuildEvent {
    /// Event marking entry into `stage`.
    pub fn transition(
        job_id: Uuid,
        project_id: ProjectId,
        stage: BuildStage,
        message: impl Into<String>,
    ) -> Self {
        Self::new(job_id, project_id, stage, EventKind::Transition, message)
    }

    /// Informational event within `stage`.
    pub fn info(
        job_id: Uuid,
        project_id: ProjectId,
        stage: BuildStage,
        message: impl Into<String>,
    ) -> Self {
        Self::new(job_id, project_id, stage, EventKind::Info, message)
    }

    fn new(
        job_id: Uuid,
        project_id: ProjectId,
        stage: BuildStage,
        kind: EventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            project_id,
            stage,
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Newline-terminated JSON line pushed to subscribers.
    pub fn to_wire(&self) -> String {
        // Serializing plain strings/enums cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    pub fn is_transition(&self) -> bool {
        self.kind == EventKind::Transition
    }
}
