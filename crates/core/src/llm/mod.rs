// crates/core/src/llm/mod.rs
//! Code-generation collaborator.
//!
//! Provides the `CodeGenerator` trait the build pipeline calls during its
//! Generating stage, and a Groq (OpenAI-compatible) implementation.

pub mod groq;
pub mod provider;
pub mod types;

pub use groq::{GroqConfig, GroqGenerator};
pub use provider::CodeGenerator;
pub use types::GenerationRequest;
