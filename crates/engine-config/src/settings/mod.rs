use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

pub mod validated;
pub mod validator;

pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// How book references to authors and genres are turned into target ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    /// Look the referenced source id up in the mappings built by the author
    /// and genre steps. A reference that was never migrated is an error.
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Resolve the natural key embedded in the reference, creating the row
    /// if it does not exist yet.
    #[serde(rename = "resolve")]
    ResolveOrCreate,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::Strict => "strict",
            ResolutionMode::ResolveOrCreate => "resolve",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ResolutionMode::Strict),
            "resolve" | "resolve-or-create" => Ok(ResolutionMode::ResolveOrCreate),
            other => Err(SettingsError::UnknownResolutionMode(other.to_string())),
        }
    }
}

/// Migration settings as written in a config file or given on the command
/// line. Unset fields fall back to defaults during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSettings {
    pub chunk_size: Option<usize>,
    pub page_size: Option<usize>,
    pub resolution: Option<ResolutionMode>,
    pub prewarm_cache: Option<bool>,
}

impl MigrationSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Layers `overrides` on top of `self`; set fields of `overrides` win.
    pub fn merge(self, overrides: MigrationSettings) -> Self {
        Self {
            chunk_size: overrides.chunk_size.or(self.chunk_size),
            page_size: overrides.page_size.or(self.page_size),
            resolution: overrides.resolution.or(self.resolution),
            prewarm_cache: overrides.prewarm_cache.or(self.prewarm_cache),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_prewarm_cache(mut self, prewarm: bool) -> Self {
        self.prewarm_cache = Some(prewarm);
        self
    }
}
