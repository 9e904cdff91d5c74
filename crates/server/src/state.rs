// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use xapp_core::llm::CodeGenerator;
use xapp_core::sandbox::SandboxProvider;
use xapp_core::store::ProjectStore;
use xapp_core::PlatformTable;

use crate::jobs::{BuildPipeline, JobLauncher};
use crate::live::{Broadcaster, SubscriberRegistry};

/// Shared application state accessible from all route handlers.
///
/// This is the composition root: the subscriber registry is created here and
/// shared by the WebSocket handler and the launcher's broadcaster, so nothing
/// in the process reaches it through a global.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Live subscribers per project.
    pub registry: Arc<SubscriberRegistry>,
    pub launcher: Arc<JobLauncher>,
    /// Project records (Supabase or in-memory).
    pub store: Arc<dyn ProjectStore>,
}

/// External collaborators a running server is built from.
pub struct Collaborators {
    pub sandboxes: Arc<dyn SandboxProvider>,
    pub generator: Arc<dyn CodeGenerator>,
    pub store: Arc<dyn ProjectStore>,
    pub platforms: PlatformTable,
    /// Reject builds for projects the store does not know.
    pub require_known_project: bool,
}

impl AppState {
    /// Wire registry → broadcaster → pipeline → launcher around the given
    /// collaborators.
    pub fn new(collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            sandboxes,
            generator,
            store,
            platforms,
            require_known_project,
        } = collaborators;

        let registry = Arc::new(SubscriberRegistry::new());
        let pipeline = BuildPipeline::new(
            Broadcaster::new(Arc::clone(&registry)),
            sandboxes,
            generator,
        );
        let mut launcher = JobLauncher::new(Arc::new(pipeline), Arc::new(platforms));
        if require_known_project {
            launcher = launcher.require_known_projects(Arc::clone(&store));
        }

        Arc::new(Self {
            start_time: Instant::now(),
            registry,
            launcher: Arc::new(launcher),
            store,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
