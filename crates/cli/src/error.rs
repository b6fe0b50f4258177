use connectors::error::StoreError;
use engine_config::error::SettingsError;
use engine_core::error::JournalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid env file: {0}")]
    EnvFile(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Run journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
