use crate::error::CliError;
use connectors::target::TargetStore;
use engine_core::state::models::RunSummary;
use engine_runtime::execution::report::JobResult;
use model::core::entity::EntityKind;
use tracing::warn;

/// Prints the run outcome followed by the row count of every target table.
///
/// Counting happens after the run; a failed count is reported but never
/// changes the outcome.
pub async fn print_result(result: &JobResult, target: &dyn TargetStore) {
    println!("{}", result.render());
    println!("target ({}):", target.name());
    for (table, rows) in table_counts(target).await {
        match rows {
            Some(rows) => println!("  {table:<9} rows={rows}"),
            None => println!("  {table:<9} rows=unavailable"),
        }
    }
}

async fn table_counts(target: &dyn TargetStore) -> Vec<(&'static str, Option<u64>)> {
    let mut counts = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        let rows = match target.count(kind).await {
            Ok(rows) => Some(rows),
            Err(error) => {
                warn!(table = kind.table(), %error, "Failed to count target rows");
                None
            }
        };
        counts.push((kind.table(), rows));
    }
    counts
}

pub fn print_history(runs: &[RunSummary], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    println!("{:<38} {:<11} {:<26} {}", "Run", "Status", "Started", "Rows");
    for run in runs {
        let started = run
            .started_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "n/a".to_string());
        let rows = run
            .steps
            .iter()
            .map(|s| format!("{}={}", s.step, s.rows_committed))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<38} {:<11} {:<26} {}", run.run_id, run.status, started, rows);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{
        error::StoreError,
        target::{TargetSession, memory::MemoryTargetStore},
    };
    use model::{core::identifiers::TargetId, records::target::TargetRecord};
    use tracing_test::traced_test;

    /// Target whose connection dropped after the run finished.
    struct Disconnected(MemoryTargetStore);

    #[async_trait]
    impl TargetStore for Disconnected {
        fn name(&self) -> &str {
            "disconnected"
        }

        async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError> {
            self.0.begin().await
        }

        async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError> {
            self.0.persist(record).await
        }

        async fn find_by_natural_key(
            &self,
            kind: EntityKind,
            key: &str,
        ) -> Result<Option<TargetId>, StoreError> {
            self.0.find_by_natural_key(kind, key).await
        }

        async fn natural_keys(
            &self,
            kind: EntityKind,
        ) -> Result<Vec<(String, TargetId)>, StoreError> {
            self.0.natural_keys(kind).await
        }

        async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
            if kind == EntityKind::Book {
                return Err(StoreError::Unavailable("connection closed".into()));
            }
            self.0.count(kind).await
        }

        async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
            self.0.fetch_all(kind).await
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_count_is_reported_not_raised() {
        let store = MemoryTargetStore::new();
        store
            .persist(&TargetRecord::root(EntityKind::Author, "Author_1").unwrap())
            .await
            .unwrap();

        let counts = table_counts(&Disconnected(store)).await;

        assert_eq!(counts.len(), 4);
        assert_eq!(counts[0].1, Some(1));
        assert_eq!(counts[2], (EntityKind::Book.table(), None));
        assert!(logs_contain("Failed to count target rows"));
    }
}
