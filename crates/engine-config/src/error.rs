use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating migration configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid resolution mode '{0}', expected 'strict' or 'resolve'")]
    UnknownResolutionMode(String),

    /// One or more settings were rejected.
    #[error("Settings validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Missing connection setting: {0}")]
    MissingConnection(&'static str),
}
