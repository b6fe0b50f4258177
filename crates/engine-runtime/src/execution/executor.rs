use crate::execution::{job::MigrationJob, report::JobResult};
use connectors::{source::SourceStore, target::TargetStore};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::state::RunJournal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one complete migration with the given stores and settings.
pub async fn run(
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    settings: ValidatedSettings,
    journal: Arc<dyn RunJournal>,
    cancel: CancellationToken,
) -> JobResult {
    MigrationJob::new(source, target, settings)
        .with_journal(journal)
        .with_cancellation(cancel)
        .run()
        .await
}
