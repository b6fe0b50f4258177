use engine_core::error::MappingError;
use engine_processing::error::{FailureKind, ReaderError, TransformError, WriterError};
use thiserror::Error;

/// Why a single step stopped.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Step '{step}' failed to read: {source}")]
    Read {
        step: &'static str,
        #[source]
        source: ReaderError,
    },

    #[error("Step '{step}' failed to process a record: {source}")]
    Process {
        step: &'static str,
        #[source]
        source: TransformError,
    },

    #[error("Step '{step}' failed to write: {source}")]
    Write {
        step: &'static str,
        #[source]
        source: WriterError,
    },

    #[error("Step '{step}' was cancelled")]
    Cancelled { step: &'static str },
}

impl StepError {
    pub fn step(&self) -> &'static str {
        match self {
            StepError::Read { step, .. }
            | StepError::Process { step, .. }
            | StepError::Write { step, .. }
            | StepError::Cancelled { step } => step,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StepError::Read { source, .. } => source.failure_kind(),
            StepError::Process { source, .. } => source.failure_kind(),
            StepError::Write { source, .. } => source.failure_kind(),
            StepError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Top-level errors for a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error("Failed to prewarm reference caches: {0}")]
    Prewarm(#[source] MappingError),

    #[error("Migration cancelled before step '{0}'")]
    Cancelled(&'static str),
}

impl MigrationError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            MigrationError::Step(err) => err.failure_kind(),
            MigrationError::Prewarm(err) => FailureKind::of_mapping(err),
            MigrationError::Cancelled(_) => FailureKind::Cancelled,
        }
    }

    /// The step the failure belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            MigrationError::Step(err) => err.step(),
            MigrationError::Cancelled(step) => step,
            MigrationError::Prewarm(_) => "prewarm",
        }
    }
}
