use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum JournalEntry {
    RunStart {
        run_id: String,
        at: DateTime<Utc>,
        settings: String,
    },
    StepStart {
        run_id: String,
        step: String,
    },
    ChunkCommitted {
        run_id: String,
        step: String,
        chunk: u64,
        rows: u64,
    },
    StepDone {
        run_id: String,
        step: String,
        read: u64,
        written: u64,
    },
    RunDone {
        run_id: String,
        status: String,
        at: DateTime<Utc>,
    },
}

impl JournalEntry {
    pub fn run_id(&self) -> &str {
        match self {
            JournalEntry::RunStart { run_id, .. } => run_id,
            JournalEntry::StepStart { run_id, .. } => run_id,
            JournalEntry::ChunkCommitted { run_id, .. } => run_id,
            JournalEntry::StepDone { run_id, .. } => run_id,
            JournalEntry::RunDone { run_id, .. } => run_id,
        }
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct StepSummary {
    pub step: String,
    pub chunks: u64,
    pub rows_committed: u64,
    pub read: Option<u64>,
    pub written: Option<u64>,
}

/// What the journal knows about one run.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `SUCCESS`, `FAILURE`, or `INCOMPLETE` when the run never finished.
    pub status: String,
    pub settings: Option<String>,
    pub steps: Vec<StepSummary>,
}

impl RunSummary {
    pub fn from_entries(run_id: &str, entries: &[JournalEntry]) -> Self {
        let mut summary = RunSummary {
            run_id: run_id.to_string(),
            started_at: None,
            finished_at: None,
            status: "INCOMPLETE".to_string(),
            settings: None,
            steps: Vec::new(),
        };

        for entry in entries {
            match entry {
                JournalEntry::RunStart { at, settings, .. } => {
                    summary.started_at = Some(*at);
                    summary.settings = Some(settings.clone());
                }
                JournalEntry::StepStart { step, .. } => {
                    summary.steps.push(StepSummary {
                        step: step.clone(),
                        ..StepSummary::default()
                    });
                }
                JournalEntry::ChunkCommitted { step, rows, .. } => {
                    if let Some(s) = summary.step_mut(step) {
                        s.chunks += 1;
                        s.rows_committed += rows;
                    }
                }
                JournalEntry::StepDone {
                    step, read, written, ..
                } => {
                    if let Some(s) = summary.step_mut(step) {
                        s.read = Some(*read);
                        s.written = Some(*written);
                    }
                }
                JournalEntry::RunDone { status, at, .. } => {
                    summary.status = status.clone();
                    summary.finished_at = Some(*at);
                }
            }
        }

        summary
    }

    fn step_mut(&mut self, step: &str) -> Option<&mut StepSummary> {
        self.steps.iter_mut().rev().find(|s| s.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tracks_steps_and_status() {
        let run_id = "run-1".to_string();
        let entries = vec![
            JournalEntry::RunStart {
                run_id: run_id.clone(),
                at: Utc::now(),
                settings: "chunk_size=10".into(),
            },
            JournalEntry::StepStart {
                run_id: run_id.clone(),
                step: "authors".into(),
            },
            JournalEntry::ChunkCommitted {
                run_id: run_id.clone(),
                step: "authors".into(),
                chunk: 1,
                rows: 10,
            },
            JournalEntry::ChunkCommitted {
                run_id: run_id.clone(),
                step: "authors".into(),
                chunk: 2,
                rows: 3,
            },
            JournalEntry::StepDone {
                run_id: run_id.clone(),
                step: "authors".into(),
                read: 13,
                written: 13,
            },
        ];

        let summary = RunSummary::from_entries(&run_id, &entries);
        assert_eq!(summary.status, "INCOMPLETE");
        assert_eq!(summary.steps.len(), 1);
        assert_eq!(summary.steps[0].chunks, 2);
        assert_eq!(summary.steps[0].rows_committed, 13);
        assert_eq!(summary.steps[0].written, Some(13));
    }
}
