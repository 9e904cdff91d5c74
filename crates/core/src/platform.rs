// crates/core/src/platform.rs
//! Platform selector → sandbox layout table.
//!
//! The build pipeline never branches on a platform name. Everything that
//! differs between targets lives in this table, so adding a platform is a
//! config change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::ValidationError;

const DEFAULT_TABLE: &str = include_str!("../assets/platforms.toml");

/// Platform used when a build request omits the selector.
pub const DEFAULT_PLATFORM: &str = "flutter";

/// Where and how one platform's generated files are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformLayout {
    pub display_name: String,
    /// Directory inside the sandbox, relative to the sandbox root.
    pub app_root: PathBuf,
    /// Fallback file for unannotated output, relative to `app_root`.
    pub entry_path: PathBuf,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub prompt_hint: String,
}

impl PlatformLayout {
    /// Sandbox-relative target for a file path relative to the app root.
    pub fn target_path(&self, relative: &Path) -> PathBuf {
        self.app_root.join(relative)
    }
}

#[derive(Debug, Error)]
pub enum PlatformTableError {
    #[error("Failed to read platform table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid platform table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Platform table defines no platforms")]
    Empty,

    #[error("Platform '{name}' has an unsafe path: {path}")]
    UnsafePath { name: String, path: PathBuf },
}

#[derive(Deserialize)]
struct TableFile {
    #[serde(default)]
    platforms: BTreeMap<String, PlatformLayout>,
}

/// All platforms the server accepts, keyed by lowercase selector.
#[derive(Debug, Clone)]
pub struct PlatformTable {
    platforms: BTreeMap<String, PlatformLayout>,
}

impl PlatformTable {
    /// The built-in Flutter + Godot table.
    pub fn builtin() -> Self {
        Self::from_toml(DEFAULT_TABLE).unwrap_or_else(|e| {
            // The embedded table is covered by tests; reaching this is a packaging bug.
            tracing::error!(error = %e, "embedded platform table is invalid");
            Self {
                platforms: BTreeMap::new(),
            }
        })
    }

    pub fn from_toml(source: &str) -> Result<Self, PlatformTableError> {
        let file: TableFile = toml::from_str(source)?;
        if file.platforms.is_empty() {
            return Err(PlatformTableError::Empty);
        }
        for (name, layout) in &file.platforms {
            for path in [&layout.app_root, &layout.entry_path] {
                if !is_contained(path) {
                    return Err(PlatformTableError::UnsafePath {
                        name: name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }
        let platforms = file
            .platforms
            .into_iter()
            .map(|(name, layout)| (name.to_ascii_lowercase(), layout))
            .collect();
        Ok(Self { platforms })
    }

    pub fn load(path: &Path) -> Result<Self, PlatformTableError> {
        let source = std::fs::read_to_string(path).map_err(|source| PlatformTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Look up a selector, case-insensitively.
    pub fn resolve(&self, selector: &str) -> Result<&PlatformLayout, ValidationError> {
        self.platforms
            .get(&selector.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::UnknownPlatform(selector.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// True when `path` is relative and never climbs above its base.
pub fn is_contained(path: &Path) -> bool {
    use std::path::Component;
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
