// Job Domain Model

use super::error::DomainError;
use super::queue::Priority;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Store-assigned surrogate key (monotonic, FIFO tie-break)
pub type JobId = i64;

/// Unique logical name (the description's file name)
pub type JobName = String;

/// Job Status
///
/// ```text
/// pending -> processing -> done
///                       -> pending   (retry budget left, or lease orphaned)
///                       -> failed    (retry budget exhausted)
/// failed  -> pending                 (manual retry only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal jobs are never re-leased automatically
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Done)
                | (Processing, Pending)
                | (Processing, Failed)
                | (Failed, Pending)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Job kind (open category, validated against configured kinds)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job Payload (opaque to the scheduler apart from `inputs` / `outputs`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn inputs(&self) -> &serde_json::Value {
        self.0.get("inputs").unwrap_or(&serde_json::Value::Null)
    }

    pub fn outputs(&self) -> &serde_json::Value {
        self.0.get("outputs").unwrap_or(&serde_json::Value::Null)
    }
}

/// Validated, normalized job ready for `enqueue`
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub name: JobName,
    pub kind: JobKind,
    pub workflow_ref: String,
    pub priority: Priority,
    pub retry_limit: i32,
    pub payload: JobPayload,
    pub metadata: Option<serde_json::Value>,
}

/// Job Entity (one row of the job record store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: JobName,
    pub kind: JobKind,
    pub workflow_ref: String,

    pub priority: Priority,
    pub status: JobStatus,

    // Retry accounting
    pub run_count: i32,
    pub retries_used: i32,
    pub retry_limit: i32,

    // Lease (set only while processing)
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<i64>, // epoch ms

    // Timing of the most recent attempt (epoch ms)
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_ms: Option<i64>,

    pub error: Option<String>,
    pub payload: JobPayload,
    pub metadata: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn is_leased_by(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Processing && self.lease_owner.as_deref() == Some(worker_id)
    }
}

/// Result of `enqueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New row created as pending
    Inserted(JobId),
    /// Known non-terminal job; descriptive fields refreshed
    Updated(JobId),
    /// Known job left untouched (terminal, or nothing changed)
    Unchanged(JobId, JobStatus),
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> JobId {
        match self {
            EnqueueOutcome::Inserted(id)
            | EnqueueOutcome::Updated(id)
            | EnqueueOutcome::Unchanged(id, _) => *id,
        }
    }
}

/// Queue statistics for the control surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
    pub avg_duration_ms: Option<f64>,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.done + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("RUNNING".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_state_machine_edges() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Pending));

        // Terminal states never regress through ingestion
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Pending));
        // Leasing only ever starts from pending
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Done));
    }

    #[test]
    fn test_payload_accessors() {
        let payload = JobPayload::new(serde_json::json!({
            "inputs": {"prompt": "a lighthouse"},
            "outputs": {"file_path": "out/lighthouse.png"}
        }));
        assert_eq!(payload.inputs()["prompt"], "a lighthouse");
        assert_eq!(payload.outputs()["file_path"], "out/lighthouse.png");

        let empty = JobPayload::new(serde_json::json!({}));
        assert!(empty.inputs().is_null());
    }
}
