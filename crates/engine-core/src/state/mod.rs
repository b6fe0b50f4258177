use crate::{
    error::JournalError,
    state::models::{JournalEntry, RunSummary},
};
use async_trait::async_trait;

pub mod models;
pub mod sled_store;

/// Append-only record of what each migration run did.
///
/// Callers treat journal failures as warnings; a migration never fails
/// because its journal could not be written.
#[async_trait]
pub trait RunJournal: Send + Sync {
    async fn append(&self, entry: &JournalEntry) -> Result<(), JournalError>;

    /// Entries of one run in the order they were appended.
    async fn entries(&self, run_id: &str) -> Result<Vec<JournalEntry>, JournalError>;

    /// One summary per recorded run, oldest first.
    async fn runs(&self) -> Result<Vec<RunSummary>, JournalError>;
}

/// Journal used when journaling is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJournal;

#[async_trait]
impl RunJournal for NoopJournal {
    async fn append(&self, _entry: &JournalEntry) -> Result<(), JournalError> {
        Ok(())
    }

    async fn entries(&self, _run_id: &str) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(Vec::new())
    }

    async fn runs(&self) -> Result<Vec<RunSummary>, JournalError> {
        Ok(Vec::new())
    }
}
