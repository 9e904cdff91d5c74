// crates/server/src/jobs/pipeline.rs
//! Staged execution of one build job.
//!
//! Started → Provisioning → Generating → Writing → Finished, with any stage
//! failure going straight to Failed. Every stage emits one transition event on
//! entry. A sandbox that was acquired is released exactly once after the
//! terminal event, and `process_finished` is always the last event. A panic
//! inside a stage is caught so the sandbox is still released.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use uuid::Uuid;
use xapp_core::llm::{CodeGenerator, GenerationRequest};
use xapp_core::platform::is_contained;
use xapp_core::sandbox::{SandboxHandle, SandboxProvider};
use xapp_core::{Artifact, BuildError, BuildEvent, BuildStage, ProjectId, WriteError};

use super::types::{BuildJob, BuildOutcome};
use crate::live::Broadcaster;

/// Characters of generated output shown in the Generating info event.
const PREVIEW_CHARS: usize = 500;

/// Failed-event message for a job cut short by a panic.
pub(crate) const ABORTED_MESSAGE: &str = "Error: build aborted unexpectedly";

pub struct BuildPipeline {
    broadcaster: Broadcaster,
    sandboxes: Arc<dyn SandboxProvider>,
    generator: Arc<dyn CodeGenerator>,
}

/// Emits events stamped with one job's id and project.
struct JobEvents<'a> {
    broadcaster: &'a Broadcaster,
    job_id: Uuid,
    project_id: &'a ProjectId,
}

impl JobEvents<'_> {
    fn transition(&self, stage: BuildStage, message: impl Into<String>) {
        let event = BuildEvent::transition(self.job_id, self.project_id.clone(), stage, message);
        self.broadcaster.broadcast(&event);
    }

    fn info(&self, stage: BuildStage, message: impl Into<String>) {
        let event = BuildEvent::info(self.job_id, self.project_id.clone(), stage, message);
        self.broadcaster.broadcast(&event);
    }
}

impl BuildPipeline {
    pub fn new(
        broadcaster: Broadcaster,
        sandboxes: Arc<dyn SandboxProvider>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            broadcaster,
            sandboxes,
            generator,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Run `job` to completion. Never fails: stage errors become an `error`
    /// event and are returned in the outcome.
    pub async fn run(&self, job: BuildJob) -> BuildOutcome {
        let events = JobEvents {
            broadcaster: &self.broadcaster,
            job_id: job.id,
            project_id: &job.project_id,
        };

        events.transition(
            BuildStage::Started,
            format!("Starting {} build...", job.layout.display_name),
        );
        events.transition(BuildStage::Provisioning, "Starting sandbox...");

        let outcome = match self.sandboxes.acquire().await {
            Err(e) => {
                let err = BuildError::from(e);
                events.transition(BuildStage::Failed, format!("Error: {err}"));
                BuildOutcome::Failed(err)
            }
            Ok(mut sandbox) => {
                events.info(
                    BuildStage::Provisioning,
                    format!("Sandbox {} started", sandbox.id()),
                );

                let result = AssertUnwindSafe(self.generate_and_write(&job, sandbox.as_mut(), &events))
                    .catch_unwind()
                    .await;
                let outcome = match result {
                    Err(panic) => {
                        tracing::error!(
                            job_id = %job.id,
                            project_id = %job.project_id,
                            panic = panic_message(panic.as_ref()),
                            "build stage panicked"
                        );
                        events.transition(BuildStage::Failed, ABORTED_MESSAGE);
                        BuildOutcome::Aborted
                    }
                    Ok(Ok(files_written)) => {
                        events.transition(
                            BuildStage::Finished,
                            format!("Build succeeded: {files_written} file(s) written"),
                        );
                        BuildOutcome::Finished { files_written }
                    }
                    Ok(Err(err)) => {
                        events.transition(BuildStage::Failed, format!("Error: {err}"));
                        BuildOutcome::Failed(err)
                    }
                };

                let sandbox_id = sandbox.id().to_string();
                if let Err(e) = sandbox.release().await {
                    tracing::warn!(
                        job_id = %job.id,
                        project_id = %job.project_id,
                        sandbox = %sandbox_id,
                        error = %e,
                        "sandbox release failed; keeping build outcome"
                    );
                }
                outcome
            }
        };

        events.transition(BuildStage::ProcessFinished, "Build finished.");
        outcome
    }

    async fn generate_and_write(
        &self,
        job: &BuildJob,
        sandbox: &mut dyn SandboxHandle,
        events: &JobEvents<'_>,
    ) -> Result<usize, BuildError> {
        events.transition(
            BuildStage::Generating,
            format!(
                "Generating code with {} ({})...",
                self.generator.name(),
                self.generator.model()
            ),
        );
        let request = GenerationRequest::for_platform(&job.prompt, &job.platform, &job.layout);
        let raw = self.generator.generate(request).await?;
        let artifact = Artifact::parse(raw, &job.layout.entry_path)?;
        events.info(
            BuildStage::Generating,
            format!("Generated:\n{}", artifact.preview(PREVIEW_CHARS)),
        );

        events.transition(BuildStage::Writing, "Writing files to sandbox...");
        for file in &artifact.files {
            if !is_contained(&file.path) {
                return Err(WriteError::InvalidPath(file.path.display().to_string()).into());
            }
            let target = job.layout.target_path(&file.path);
            sandbox.write(&target, &file.contents).await?;
            events.info(BuildStage::Writing, format!("Wrote {}", file.path.display()));
        }
        Ok(artifact.file_count())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{
        collect_events, stages, FakeGenerator, FakeSandboxProvider, SandboxFault,
    };
    use crate::live::{Subscriber, SubscriberRegistry};
    use pretty_assertions::assert_eq;
    use xapp_core::{EventKind, GenerationError, PlatformTable, ProvisioningError};

    const DART: &str = "```dart lib/main.dart\nvoid main() {}\n```\n\n```yaml pubspec.yaml\nname: todo\n```";

    struct Harness {
        pipeline: BuildPipeline,
        sandboxes: Arc<FakeSandboxProvider>,
        rx: tokio::sync::mpsc::UnboundedReceiver<String>,
        job: BuildJob,
    }

    fn harness(generator: FakeGenerator, sandboxes: FakeSandboxProvider) -> Harness {
        let registry = Arc::new(SubscriberRegistry::new());
        let project = ProjectId::parse("p1").unwrap();
        let (subscriber, rx) = Subscriber::channel();
        registry.attach(&project, subscriber);

        let sandboxes = Arc::new(sandboxes);
        let pipeline = BuildPipeline::new(
            Broadcaster::new(registry),
            sandboxes.clone(),
            Arc::new(generator),
        );
        let table = PlatformTable::builtin();
        let job = BuildJob::new(
            project,
            "todo app",
            "flutter",
            table.resolve("flutter").unwrap().clone(),
        );
        Harness {
            pipeline,
            sandboxes,
            rx,
            job,
        }
    }

    #[tokio::test]
    async fn test_success_stage_sequence() {
        let mut h = harness(FakeGenerator::reply(DART), FakeSandboxProvider::new());
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(outcome, BuildOutcome::Finished { files_written: 2 }));

        let events = collect_events(&mut h.rx);
        assert_eq!(
            stages(&events),
            vec![
                BuildStage::Started,
                BuildStage::Provisioning,
                BuildStage::Generating,
                BuildStage::Writing,
                BuildStage::Finished,
                BuildStage::ProcessFinished,
            ]
        );
        assert!(events.iter().all(|e| e.job_id == h.job.id));
        assert_eq!(h.sandboxes.releases(), 1);

        let written = h.sandboxes.written_paths();
        assert_eq!(
            written,
            vec![
                "home/user/app/lib/main.dart".to_string(),
                "home/user/app/pubspec.yaml".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_info_events_stay_within_their_stage() {
        let mut h = harness(FakeGenerator::reply(DART), FakeSandboxProvider::new());
        h.pipeline.run(h.job.clone()).await;

        let events = collect_events(&mut h.rx);
        let infos: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::Info)
            .map(|e| (e.stage, e.message.clone()))
            .collect();
        assert_eq!(infos[0].0, BuildStage::Provisioning);
        assert!(infos[1].1.starts_with("Generated:\n```dart"));
        assert_eq!(infos[2], (BuildStage::Writing, "Wrote lib/main.dart".to_string()));
        assert_eq!(infos[3], (BuildStage::Writing, "Wrote pubspec.yaml".to_string()));
        assert_eq!(events.last().unwrap().message, "Build finished.");
    }

    #[tokio::test]
    async fn test_provisioning_failure_skips_later_stages() {
        let mut h = harness(
            FakeGenerator::reply(DART),
            FakeSandboxProvider::with_fault(SandboxFault::Acquire),
        );
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(
            outcome,
            BuildOutcome::Failed(BuildError::Provisioning(ProvisioningError::Unavailable(_)))
        ));

        let events = collect_events(&mut h.rx);
        assert_eq!(
            stages(&events),
            vec![
                BuildStage::Started,
                BuildStage::Provisioning,
                BuildStage::Failed,
                BuildStage::ProcessFinished,
            ]
        );
        let failed = events.iter().find(|e| e.stage == BuildStage::Failed).unwrap();
        assert!(failed.message.contains("Sandbox unavailable"));
        // Nothing was acquired, so nothing to release.
        assert_eq!(h.sandboxes.releases(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let mut h = harness(
            FakeGenerator::fail(|| GenerationError::Api {
                status: 500,
                message: "model overloaded".into(),
            }),
            FakeSandboxProvider::new(),
        );
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert_eq!(outcome.label(), "failed");

        let events = collect_events(&mut h.rx);
        assert_eq!(
            stages(&events),
            vec![
                BuildStage::Started,
                BuildStage::Provisioning,
                BuildStage::Generating,
                BuildStage::Failed,
                BuildStage::ProcessFinished,
            ]
        );
        let failed = events.iter().find(|e| e.stage == BuildStage::Failed).unwrap();
        assert!(failed.message.contains("model overloaded"));
        assert_eq!(h.sandboxes.releases(), 1);
    }

    #[tokio::test]
    async fn test_empty_generation_is_failure() {
        let mut h = harness(FakeGenerator::reply("   \n"), FakeSandboxProvider::new());
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(
            outcome,
            BuildOutcome::Failed(BuildError::Generation(GenerationError::EmptyArtifact))
        ));
        let events = collect_events(&mut h.rx);
        assert!(!stages(&events).contains(&BuildStage::Writing));
        assert_eq!(h.sandboxes.releases(), 1);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let mut h = harness(
            FakeGenerator::reply(DART),
            FakeSandboxProvider::with_fault(SandboxFault::Write),
        );
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(outcome, BuildOutcome::Failed(BuildError::Write(_))));

        let events = collect_events(&mut h.rx);
        assert_eq!(
            stages(&events),
            vec![
                BuildStage::Started,
                BuildStage::Provisioning,
                BuildStage::Generating,
                BuildStage::Writing,
                BuildStage::Failed,
                BuildStage::ProcessFinished,
            ]
        );
        assert_eq!(h.sandboxes.releases(), 1);
    }

    #[tokio::test]
    async fn test_escaping_artifact_path_is_write_failure() {
        let mut h = harness(
            FakeGenerator::reply("```dart ../../etc/evil.dart\nvoid main() {}\n```"),
            FakeSandboxProvider::new(),
        );
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(
            outcome,
            BuildOutcome::Failed(BuildError::Write(WriteError::InvalidPath(_)))
        ));
        assert!(h.sandboxes.written_paths().is_empty());
        assert_eq!(h.sandboxes.releases(), 1);
        let events = collect_events(&mut h.rx);
        assert_eq!(events.last().unwrap().stage, BuildStage::ProcessFinished);
    }

    #[tokio::test]
    async fn test_panicking_stage_still_releases_sandbox() {
        let mut h = harness(FakeGenerator::panics(), FakeSandboxProvider::new());
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(matches!(outcome, BuildOutcome::Aborted));
        assert_eq!(outcome.label(), "aborted");
        assert_eq!(h.sandboxes.releases(), 1);

        let events = collect_events(&mut h.rx);
        assert_eq!(
            stages(&events),
            vec![
                BuildStage::Started,
                BuildStage::Provisioning,
                BuildStage::Generating,
                BuildStage::Failed,
                BuildStage::ProcessFinished,
            ]
        );
        let failed = events.iter().find(|e| e.stage == BuildStage::Failed).unwrap();
        assert_eq!(failed.message, ABORTED_MESSAGE);
    }

    #[tokio::test]
    async fn test_generating_message_names_model() {
        let mut h = harness(FakeGenerator::reply(DART), FakeSandboxProvider::new());
        h.pipeline.run(h.job.clone()).await;
        let events = collect_events(&mut h.rx);
        let generating = events
            .iter()
            .find(|e| e.stage == BuildStage::Generating && e.kind == EventKind::Transition)
            .unwrap();
        assert_eq!(generating.message, "Generating code with fake (fake-model)...");
    }

    #[tokio::test]
    async fn test_release_error_does_not_replace_outcome() {
        let mut h = harness(
            FakeGenerator::reply(DART),
            FakeSandboxProvider::with_fault(SandboxFault::Release),
        );
        let outcome = h.pipeline.run(h.job.clone()).await;
        assert!(outcome.is_success());
        assert_eq!(h.sandboxes.releases(), 1);

        let events = collect_events(&mut h.rx);
        assert_eq!(
            &stages(&events)[4..],
            &[BuildStage::Finished, BuildStage::ProcessFinished]
        );
    }

    #[tokio::test]
    async fn test_runs_without_subscribers() {
        let sandboxes = Arc::new(FakeSandboxProvider::new());
        let pipeline = BuildPipeline::new(
            Broadcaster::new(Arc::new(SubscriberRegistry::new())),
            sandboxes.clone(),
            Arc::new(FakeGenerator::reply(DART)),
        );
        let table = PlatformTable::builtin();
        let job = BuildJob::new(
            ProjectId::parse("nobody-listening").unwrap(),
            "todo app",
            "flutter",
            table.resolve("flutter").unwrap().clone(),
        );
        assert!(pipeline.run(job).await.is_success());
        assert_eq!(sandboxes.releases(), 1);
        assert_eq!(pipeline.broadcaster().registry().project_count(), 0);
    }
}
