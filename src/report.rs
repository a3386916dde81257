use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Outcome of one model's harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRun {
    pub model: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Per-job status report covering every model in the batch. Failures are
/// recorded here rather than aborting the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub runs: Vec<ModelRun>,
}

impl JobReport {
    pub fn completed(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.completed()
    }
}
