use crate::{
    error::JournalError,
    state::{
        RunJournal,
        models::{JournalEntry, RunSummary},
    },
};
use async_trait::async_trait;
use std::{collections::BTreeMap, path::Path};

/// Run journal in an embedded sled database.
///
/// Entries are keyed `wal:<run_id>:<seq>` where `seq` is a zero-padded,
/// monotonically increasing id, so a prefix scan yields one run in append order.
pub struct SledRunJournal {
    db: sled::Db,
}

impl SledRunJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn wal_key(run_id: &str, seq: u64) -> String {
        format!("wal:{}:{:020}", run_id, seq)
    }
}

#[async_trait]
impl RunJournal for SledRunJournal {
    async fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let seq = self.db.generate_id()?;
        let key = Self::wal_key(entry.run_id(), seq);
        let value = bincode::serialize(entry)?;

        self.db.insert(key, value)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn entries(&self, run_id: &str) -> Result<Vec<JournalEntry>, JournalError> {
        let prefix = format!("wal:{}:", run_id);
        let mut entries = Vec::new();

        for item in self.db.scan_prefix(prefix) {
            let (_key, value) = item?;
            entries.push(bincode::deserialize(&value)?);
        }

        Ok(entries)
    }

    async fn runs(&self) -> Result<Vec<RunSummary>, JournalError> {
        let mut by_run: BTreeMap<String, Vec<JournalEntry>> = BTreeMap::new();

        for item in self.db.scan_prefix("wal:") {
            let (_key, value) = item?;
            let entry: JournalEntry = bincode::deserialize(&value)?;
            by_run
                .entry(entry.run_id().to_string())
                .or_default()
                .push(entry);
        }

        let mut runs: Vec<RunSummary> = by_run
            .iter()
            .map(|(run_id, entries)| RunSummary::from_entries(run_id, entries))
            .collect();
        runs.sort_by_key(|run| run.started_at);
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn start(run_id: &str, offset_secs: i64) -> JournalEntry {
        JournalEntry::RunStart {
            run_id: run_id.into(),
            at: Utc::now() + Duration::seconds(offset_secs),
            settings: "{}".into(),
        }
    }

    #[tokio::test]
    async fn entries_come_back_in_append_order() {
        let dir = tempdir().unwrap();
        let journal = SledRunJournal::open(dir.path()).unwrap();

        journal.append(&start("run-a", 0)).await.unwrap();
        for step in ["authors", "genres", "books", "comments"] {
            journal
                .append(&JournalEntry::StepStart {
                    run_id: "run-a".into(),
                    step: step.into(),
                })
                .await
                .unwrap();
        }

        let entries = journal.entries("run-a").await.unwrap();
        assert_eq!(entries.len(), 5);
        let steps: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                JournalEntry::StepStart { step, .. } => Some(step.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec!["authors", "genres", "books", "comments"]);
    }

    #[tokio::test]
    async fn runs_are_isolated_and_ordered_by_start() {
        let dir = tempdir().unwrap();
        let journal = SledRunJournal::open(dir.path()).unwrap();

        journal.append(&start("run-z", 0)).await.unwrap();
        journal.append(&start("run-a", 60)).await.unwrap();
        journal
            .append(&JournalEntry::RunDone {
                run_id: "run-z".into(),
                status: "SUCCESS".into(),
                at: Utc::now(),
            })
            .await
            .unwrap();

        // A run id that is a prefix of another must not pick up its entries.
        journal.append(&start("run-a1", 120)).await.unwrap();
        assert_eq!(journal.entries("run-a").await.unwrap().len(), 1);

        let runs = journal.runs().await.unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["run-z", "run-a", "run-a1"]);
        assert_eq!(runs[0].status, "SUCCESS");
        assert_eq!(runs[1].status, "INCOMPLETE");
    }
}
