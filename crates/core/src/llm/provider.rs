// crates/core/src/llm/provider.rs
//! CodeGenerator trait defining the interface to the generation service.

use async_trait::async_trait;

use super::types::GenerationRequest;
use crate::error::GenerationError;

/// A stateless request/response generation service.
///
/// Implementations own their timeout and retry policy. Any error returned
/// here ends the build with a single Failed event; the pipeline never retries.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce artifact text for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// Provider name for logging/display (e.g. "groq").
    fn name(&self) -> &str;

    /// Model identifier (e.g. "llama-3.3-70b-versatile").
    fn model(&self) -> &str;
}
