use crate::{
    error::MigrationError,
    execution::{
        factory::StepFactory,
        report::{JobResult, JobStatus, StepReport},
    },
};
use chrono::Utc;
use connectors::{source::SourceStore, target::TargetStore};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{
    context::MigrationContext,
    state::{NoopJournal, RunJournal, models::JournalEntry},
};
use model::core::{entity::EntityKind, identifiers::RunId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Authors, genres, books, comments: the order references require.
pub const STEP_ORDER: [EntityKind; 4] = EntityKind::ALL;

/// The full migration: runs every step in dependency order and stops at the
/// first failure.
///
/// Each call to [`run`](MigrationJob::run) builds a fresh context, so mapper
/// caches and cross mappings never carry over between runs. Rows committed
/// before a failure stay committed.
pub struct MigrationJob {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    settings: ValidatedSettings,
    journal: Arc<dyn RunJournal>,
    cancel: CancellationToken,
    steps: Vec<EntityKind>,
}

impl MigrationJob {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        settings: ValidatedSettings,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            journal: Arc::new(NoopJournal),
            cancel: CancellationToken::new(),
            steps: STEP_ORDER.to_vec(),
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn RunJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Restricts the run to the given steps, still executed in the given order.
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = EntityKind>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    pub async fn run(&self) -> JobResult {
        let run_id = RunId::generate();
        let started_at = Utc::now();
        info!(run_id = %run_id, settings = %self.settings.describe(), "Migration started");

        self.record(JournalEntry::RunStart {
            run_id: run_id.to_string(),
            at: started_at,
            settings: self.settings.describe(),
        })
        .await;

        let ctx = Arc::new(MigrationContext::new(run_id.clone(), Arc::clone(&self.target)));
        let mut steps = Vec::with_capacity(self.steps.len());
        let outcome = self.run_steps(&ctx, &mut steps).await;

        let (status, failed_step, cause, failure_kind) = match &outcome {
            Ok(()) => (JobStatus::Success, None, None, None),
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Migration failed");
                (
                    JobStatus::Failure,
                    Some(err.step().to_string()),
                    Some(err.to_string()),
                    Some(err.failure_kind()),
                )
            }
        };

        let finished_at = Utc::now();
        self.record(JournalEntry::RunDone {
            run_id: run_id.to_string(),
            status: status.as_str().to_string(),
            at: finished_at,
        })
        .await;

        if status == JobStatus::Success {
            info!(
                run_id = %run_id,
                duration_ms = (finished_at - started_at).num_milliseconds(),
                "Migration completed"
            );
        }

        JobResult {
            run_id,
            status,
            started_at,
            finished_at,
            steps,
            failed_step,
            cause,
            failure_kind,
        }
    }

    async fn run_steps(
        &self,
        ctx: &Arc<MigrationContext>,
        reports: &mut Vec<StepReport>,
    ) -> Result<(), MigrationError> {
        if self.settings.prewarm_cache() {
            let loaded = ctx.prewarm().await.map_err(MigrationError::Prewarm)?;
            info!(loaded, "Reference caches prewarmed");
        }

        let factory = StepFactory::new(
            Arc::clone(ctx),
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.settings.clone(),
        )
        .with_cancellation(self.cancel.clone())
        .with_journal(Arc::clone(&self.journal));

        let total = self.steps.len();
        for (idx, kind) in self.steps.iter().enumerate() {
            let step = factory.build(*kind);
            let name = step.name();

            if self.cancel.is_cancelled() {
                warn!("Shutdown requested before step {}/{}: {}", idx + 1, total, name);
                return Err(MigrationError::Cancelled(name));
            }

            info!("Running step {}/{}: {}", idx + 1, total, name);
            self.record(JournalEntry::StepStart {
                run_id: ctx.run_id.to_string(),
                step: name.to_string(),
            })
            .await;

            let report = step.run().await?;

            self.record(JournalEntry::StepDone {
                run_id: ctx.run_id.to_string(),
                step: name.to_string(),
                read: report.read,
                written: report.written,
            })
            .await;
            reports.push(report);
        }

        Ok(())
    }

    /// Journal failures never fail the migration.
    async fn record(&self, entry: JournalEntry) {
        if let Err(error) = self.journal.append(&entry).await {
            warn!(%error, "Failed to write run journal entry");
        }
    }
}
