// crates/server/src/jobs/launcher.rs
//! Accepts build requests and hands them to supervised background tasks.
//!
//! A launch validates the request, spawns the pipeline and returns an
//! acknowledgement without waiting. No `JoinHandle` is kept: the only way to
//! observe a job is its event stream. The supervising task runs the pipeline
//! in an inner task so a panic outside a stage still produces `error` and
//! `process_finished`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use xapp_core::store::ProjectStore;
use xapp_core::{
    BuildEvent, BuildStage, PlatformTable, ProjectId, StoreError, ValidationError,
};

use super::pipeline::{BuildPipeline, ABORTED_MESSAGE};
use super::types::{BuildAccepted, BuildJob, BuildOutcome};
use crate::metrics;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Could not verify project: {0}")]
    Store(#[from] StoreError),
}

pub struct JobLauncher {
    pipeline: Arc<BuildPipeline>,
    platforms: Arc<PlatformTable>,
    /// When set, launches for projects unknown to this store are rejected.
    known_projects: Option<Arc<dyn ProjectStore>>,
    active: Arc<AtomicUsize>,
}

/// Keeps the active-build count in step with supervisor tasks.
struct ActiveBuild(Arc<AtomicUsize>);

impl ActiveBuild {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_builds(now);
        Self(counter)
    }
}

impl Drop for ActiveBuild {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_builds(now);
    }
}

impl JobLauncher {
    pub fn new(pipeline: Arc<BuildPipeline>, platforms: Arc<PlatformTable>) -> Self {
        Self {
            pipeline,
            platforms,
            known_projects: None,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn require_known_projects(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.known_projects = Some(store);
        self
    }

    pub fn platforms(&self) -> &PlatformTable {
        &self.platforms
    }

    /// Builds whose supervisor task has not finished yet.
    pub fn active_builds(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate and schedule a build. Returns as soon as the job is spawned;
    /// concurrent launches for one project are neither rejected nor queued.
    pub async fn launch(
        &self,
        project_id: &str,
        prompt: &str,
        platform: &str,
    ) -> Result<BuildAccepted, LaunchError> {
        let project_id = ProjectId::parse(project_id)?;
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt.into());
        }
        let selector = platform.trim().to_ascii_lowercase();
        let layout = self.platforms.resolve(&selector)?.clone();

        if let Some(store) = &self.known_projects {
            if !store.exists(project_id.as_str()).await? {
                return Err(LaunchError::ProjectNotFound(project_id));
            }
        }

        let job = BuildJob::new(project_id, prompt.trim(), selector, layout);
        let accepted = BuildAccepted::for_job(&job);
        self.spawn(job);
        Ok(accepted)
    }

    fn spawn(&self, job: BuildJob) {
        let pipeline = Arc::clone(&self.pipeline);
        let active = ActiveBuild::enter(Arc::clone(&self.active));
        let job_id = job.id;
        let project_id = job.project_id.clone();
        metrics::record_build_started();
        tracing::info!(
            job_id = %job_id,
            project_id = %project_id,
            platform = %job.platform,
            "build accepted"
        );

        tokio::spawn(async move {
            let _active = active;
            let inner = tokio::spawn({
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.run(job).await }
            });

            match inner.await {
                Ok(BuildOutcome::Finished { files_written }) => {
                    tracing::info!(job_id = %job_id, project_id = %project_id, files_written, "build finished");
                    metrics::record_build_completed("finished");
                }
                Ok(BuildOutcome::Failed(err)) => {
                    tracing::warn!(
                        job_id = %job_id,
                        project_id = %project_id,
                        kind = err.kind(),
                        error = %err,
                        "build failed"
                    );
                    metrics::record_build_completed("failed");
                }
                Ok(BuildOutcome::Aborted) => {
                    tracing::error!(job_id = %job_id, project_id = %project_id, "build aborted");
                    metrics::record_build_completed("aborted");
                }
                Err(join_err) => {
                    tracing::error!(
                        job_id = %job_id,
                        project_id = %project_id,
                        error = %join_err,
                        "build task aborted"
                    );
                    let broadcaster = pipeline.broadcaster();
                    broadcaster.broadcast(&BuildEvent::transition(
                        job_id,
                        project_id.clone(),
                        BuildStage::Failed,
                        ABORTED_MESSAGE,
                    ));
                    broadcaster.broadcast(&BuildEvent::transition(
                        job_id,
                        project_id,
                        BuildStage::ProcessFinished,
                        "Build finished.",
                    ));
                    metrics::record_build_completed("panicked");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{collect_events, stages, FakeGenerator, FakeSandboxProvider};
    use crate::live::{Broadcaster, Subscriber, SubscriberRegistry};
    use std::time::Duration;
    use tokio::sync::Notify;
    use xapp_core::store::MemoryProjectStore;
    use xapp_core::NewProject;

    const DART: &str = "```dart lib/main.dart\nvoid main() {}\n```";

    fn launcher_with(generator: FakeGenerator) -> (JobLauncher, Arc<SubscriberRegistry>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let pipeline = BuildPipeline::new(
            Broadcaster::new(Arc::clone(&registry)),
            Arc::new(FakeSandboxProvider::new()),
            Arc::new(generator),
        );
        let launcher = JobLauncher::new(Arc::new(pipeline), Arc::new(PlatformTable::builtin()));
        (launcher, registry)
    }

    async fn wait_idle(launcher: &JobLauncher) {
        for _ in 0..200 {
            if launcher.active_builds() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("builds still active");
    }

    #[tokio::test]
    async fn test_rejects_malformed_project_id() {
        let (launcher, _) = launcher_with(FakeGenerator::reply(DART));
        let too_long = "x".repeat(65);
        for bad in ["", "a/b", "has space", too_long.as_str()] {
            let err = launcher.launch(bad, "todo app", "flutter").await.unwrap_err();
            assert!(
                matches!(err, LaunchError::Validation(ValidationError::InvalidProjectId { .. })),
                "{bad:?} -> {err:?}"
            );
        }
        assert_eq!(launcher.active_builds(), 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_prompt_and_unknown_platform() {
        let (launcher, _) = launcher_with(FakeGenerator::reply(DART));
        assert!(matches!(
            launcher.launch("p1", "  ", "flutter").await,
            Err(LaunchError::Validation(ValidationError::EmptyPrompt))
        ));
        assert!(matches!(
            launcher.launch("p1", "todo", "unity").await,
            Err(LaunchError::Validation(ValidationError::UnknownPlatform(_)))
        ));
    }

    #[tokio::test]
    async fn test_acknowledges_before_build_completes() {
        let gate = Arc::new(Notify::new());
        let (launcher, registry) = launcher_with(FakeGenerator::reply(DART).gated(gate.clone()));
        let project = ProjectId::parse("p1").unwrap();
        let (subscriber, mut rx) = Subscriber::channel();
        registry.attach(&project, subscriber);

        let accepted = launcher.launch("p1", "todo app", "Flutter").await.unwrap();
        assert_eq!(accepted.message, "Build started");
        assert_eq!(accepted.project_id, project);
        // Generation is parked on the gate, so the job is still running.
        assert_eq!(launcher.active_builds(), 1);

        gate.notify_one();
        wait_idle(&launcher).await;

        let events = collect_events(&mut rx);
        assert!(events.iter().all(|e| e.job_id == accepted.job_id));
        assert_eq!(stages(&events).last(), Some(&BuildStage::ProcessFinished));
    }

    #[tokio::test]
    async fn test_panicking_pipeline_still_ends_stream() {
        let (launcher, registry) = launcher_with(FakeGenerator::panics());
        let project = ProjectId::parse("p1").unwrap();
        let (subscriber, mut rx) = Subscriber::channel();
        registry.attach(&project, subscriber);

        launcher.launch("p1", "todo app", "flutter").await.unwrap();
        wait_idle(&launcher).await;

        let events = collect_events(&mut rx);
        let tail: Vec<_> = stages(&events).into_iter().rev().take(2).collect();
        assert_eq!(tail, vec![BuildStage::ProcessFinished, BuildStage::Failed]);
    }

    #[tokio::test]
    async fn test_concurrent_builds_on_one_project_interleave() {
        let (launcher, registry) = launcher_with(FakeGenerator::reply(DART));
        let project = ProjectId::parse("p1").unwrap();
        let (subscriber, mut rx) = Subscriber::channel();
        registry.attach(&project, subscriber);

        let a = launcher.launch("p1", "one", "flutter").await.unwrap();
        let b = launcher.launch("p1", "two", "flutter").await.unwrap();
        assert_ne!(a.job_id, b.job_id);
        wait_idle(&launcher).await;

        let events = collect_events(&mut rx);
        for job in [a.job_id, b.job_id] {
            let own: Vec<_> = events.iter().filter(|e| e.job_id == job).cloned().collect();
            assert_eq!(
                stages(&own),
                vec![
                    BuildStage::Started,
                    BuildStage::Provisioning,
                    BuildStage::Generating,
                    BuildStage::Writing,
                    BuildStage::Finished,
                    BuildStage::ProcessFinished,
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_require_known_projects() {
        let store = Arc::new(MemoryProjectStore::new());
        let project = store
            .create(NewProject {
                name: "Todo".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let (launcher, _) = launcher_with(FakeGenerator::reply(DART));
        let launcher = launcher.require_known_projects(store);

        assert!(matches!(
            launcher.launch("unknown-project", "todo", "flutter").await,
            Err(LaunchError::ProjectNotFound(_))
        ));
        assert!(launcher.launch(&project.id, "todo", "flutter").await.is_ok());
        wait_idle(&launcher).await;
    }
}
