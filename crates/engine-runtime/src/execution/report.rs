use chrono::{DateTime, Utc};
use engine_processing::error::FailureKind;
use model::core::{entity::EntityKind, identifiers::RunId};
use serde::Serialize;
use std::fmt::Write;

/// Counts for one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub name: &'static str,
    pub kind: EntityKind,
    pub read: u64,
    pub written: u64,
    /// Rows inserted by chunk writes; for authors and genres this excludes reused keys.
    pub created: u64,
    pub chunks: u64,
    pub pages: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Success,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
        }
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub run_id: RunId,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Steps that completed, in execution order.
    pub steps: Vec<StepReport>,
    pub failed_step: Option<String>,
    pub cause: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    pub fn step(&self, kind: EntityKind) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Human-readable summary for the command line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "run: {}", self.run_id);
        let _ = writeln!(out, "status: {}", self.status.as_str());

        for step in &self.steps {
            let _ = writeln!(
                out,
                "  {:<9} read={:<6} written={:<6} created={:<6} chunks={:<4} ({} ms)",
                step.name, step.read, step.written, step.created, step.chunks, step.duration_ms
            );
        }

        if let Some(step) = &self.failed_step {
            let _ = writeln!(out, "failed step: {step}");
        }
        if let Some(kind) = &self.failure_kind {
            let _ = writeln!(out, "failure kind: {kind}");
        }
        if let Some(cause) = &self.cause {
            let _ = writeln!(out, "cause: {cause}");
        }

        let elapsed = self.finished_at - self.started_at;
        let _ = write!(out, "elapsed: {} ms", elapsed.num_milliseconds());
        out
    }
}
