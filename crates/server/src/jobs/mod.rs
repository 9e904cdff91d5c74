// crates/server/src/jobs/mod.rs
//! Build jobs: the staged pipeline and the launcher that supervises it.

pub mod launcher;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use launcher::{JobLauncher, LaunchError};
pub use pipeline::BuildPipeline;
pub use types::{BuildAccepted, BuildJob, BuildOutcome, BuildRequest};
