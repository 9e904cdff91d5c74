// crates/core/src/llm/types.rs
//! Request types for code generation.

use serde::{Deserialize, Serialize};

use crate::platform::PlatformLayout;

/// Default sampling temperature for generation requests.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Request for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's description of the app to build.
    pub prompt: String,
    /// Platform selector as accepted by the platform table.
    pub platform: String,
    pub system_prompt: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Build a request whose system prompt is tailored to `layout`.
    pub fn for_platform(
        prompt: impl Into<String>,
        platform: impl Into<String>,
        layout: &PlatformLayout,
    ) -> Self {
        let prompt = prompt.into();
        let system_prompt = system_prompt(&prompt, layout);
        Self {
            prompt,
            platform: platform.into(),
            system_prompt,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }
}

fn system_prompt(prompt: &str, layout: &PlatformLayout) -> String {
    let language = if layout.language.is_empty() {
        "text"
    } else {
        layout.language.as_str()
    };
    let mut out = format!(
        "You are an expert {name} developer. Generate a complete, working project based on this description:\n\
         {prompt}\n\n\
         Use best practices. Output only the code files with paths.\n",
        name = layout.display_name,
    );
    if !layout.prompt_hint.is_empty() {
        out.push_str(&layout.prompt_hint);
        out.push('\n');
    }
    out.push_str(&format!(
        "Emit every file as a fenced code block whose info string is the language followed by \
         the file path relative to the project root, for example ```{language} {entry}",
        entry = layout.entry_path.display(),
    ));
    out
}
