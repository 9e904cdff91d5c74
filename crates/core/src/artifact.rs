// crates/core/src/artifact.rs
//! Splitting generator output into files.
//!
//! Generators are asked to emit each file as a fenced code block whose path
//! appears either in the fence info string (```dart lib/main.dart) or on the
//! line just before the fence (`lib/main.dart`, **lib/main.dart**,
//! `// File: lib/main.dart`, `### lib/main.dart`).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::GenerationError;

/// One file of generated output, relative to the platform's app root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Generated output held in memory between Generating and Writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub raw: String,
    pub files: Vec<ArtifactFile>,
}

impl Artifact {
    /// Parse generator text. Unannotated output lands in `entry_path`.
    pub fn parse(raw: impl Into<String>, entry_path: &Path) -> Result<Self, GenerationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(GenerationError::EmptyArtifact);
        }

        let blocks = fenced_blocks(&raw);
        let mut files: Vec<ArtifactFile> = blocks
            .iter()
            .filter_map(|b| {
                b.path.as_ref().map(|p| ArtifactFile {
                    path: normalize(p),
                    contents: b.contents.clone(),
                })
            })
            .collect();

        if files.is_empty() {
            let contents = match blocks.as_slice() {
                [only] => only.contents.clone(),
                [] => raw.clone(),
                // Several anonymous blocks: keep the largest, it is the program.
                many => many
                    .iter()
                    .max_by_key(|b| b.contents.len())
                    .map(|b| b.contents.clone())
                    .unwrap_or_default(),
            };
            if contents.trim().is_empty() {
                return Err(GenerationError::EmptyArtifact);
            }
            files.push(ArtifactFile {
                path: entry_path.to_path_buf(),
                contents,
            });
        } else {
            // Later blocks for the same path win.
            let mut deduped: Vec<ArtifactFile> = Vec::with_capacity(files.len());
            for file in files {
                match deduped.iter_mut().find(|f| f.path == file.path) {
                    Some(existing) => existing.contents = file.contents,
                    None => deduped.push(file),
                }
            }
            files = deduped;
        }

        Ok(Self { raw, files })
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// First `max_chars` characters of the raw output, for progress events.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.raw.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}

struct Block {
    path: Option<String>,
    contents: String,
}

fn fenced_blocks(raw: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut previous_line: Option<&str> = None;
    let mut open: Option<(Option<String>, Vec<&str>)> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        match open.as_mut() {
            Some((_, body)) => {
                if trimmed.starts_with("```") {
                    if let Some((path, body)) = open.take() {
                        let mut contents = body.join("\n");
                        contents.push('\n');
                        blocks.push(Block { path, contents });
                    }
                } else {
                    body.push(line);
                }
            }
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let path = path_from_info(info).or_else(|| previous_line.and_then(path_from_header));
                    open = Some((path, Vec::new()));
                } else if !trimmed.is_empty() {
                    previous_line = Some(trimmed);
                    continue;
                }
                previous_line = None;
            }
        }
    }

    // An unterminated trailing fence still carries code.
    if let Some((path, body)) = open {
        if !body.is_empty() {
            let mut contents = body.join("\n");
            contents.push('\n');
            blocks.push(Block { path, contents });
        }
    }
    blocks
}

fn path_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        // Absolute and `..` paths match too; containment is checked at write time.
        Regex::new(r"^(?:\./|/)?(?:[A-Za-z0-9_\-.]+/)*[A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*\.[A-Za-z0-9]+$").ok()
    })
    .as_ref()
}

fn looks_like_path(candidate: &str) -> bool {
    path_pattern().is_some_and(|re| re.is_match(candidate))
}

/// ```dart lib/main.dart  or  ```lib/main.dart  or  ```dart title="lib/main.dart"
fn path_from_info(info: &str) -> Option<String> {
    info.split_whitespace()
        .map(|tok| {
            tok.trim_start_matches("title=")
                .trim_start_matches("path=")
                .trim_matches(|c| c == '"' || c == '\'')
        })
        .find(|tok| looks_like_path(tok))
        .map(str::to_string)
}

fn path_from_header(line: &str) -> Option<String> {
    let mut candidate = line
        .trim_start_matches(['#', '/', '-', '*', ' '])
        .trim_end_matches([':', '*', ' ']);
    for prefix in ["File:", "file:", "Path:", "path:", "Filename:", "filename:"] {
        if let Some(rest) = candidate.strip_prefix(prefix) {
            candidate = rest.trim();
        }
    }
    let candidate = candidate.trim_matches(|c| c == '`' || c == '*' || c == '"');
    looks_like_path(candidate).then(|| candidate.to_string())
}

fn normalize(path: &str) -> PathBuf {
    PathBuf::from(path.trim_start_matches("./"))
}
