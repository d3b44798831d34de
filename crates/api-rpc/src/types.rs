//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use gantry_core::domain::{Job, StatusCounts};
use serde::{Deserialize, Serialize};

/// queue.list.v1 - Jobs in lease order
#[derive(Debug, Default, Deserialize)]
pub struct ListRequest {
    /// pending | processing | done | failed
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub jobs: Vec<JobSummary>,
}

/// One row of a listing
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub workflow_ref: String,
    pub priority: i32,
    pub status: String,
    pub run_count: i32,
    pub retries_used: i32,
    pub retry_limit: i32,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            kind: job.kind.to_string(),
            workflow_ref: job.workflow_ref.clone(),
            priority: job.priority,
            status: job.status.to_string(),
            run_count: job.run_count,
            retries_used: job.retries_used,
            retry_limit: job.retry_limit,
            duration_ms: job.duration_ms,
            error: job.error.clone(),
        }
    }
}

/// queue.get.v1 / queue.god_mode.v1 / queue.retry.v1 - Address a job by name
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// Full record, returned by every by-name method
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job: Job,
}

/// queue.set_priority.v1
#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub name: String,
    /// Clamped to the configured range
    pub priority: i64,
}

/// admin.stats.v1 - Queue statistics
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub processing_jobs: i64,
    pub done_jobs: i64,
    pub failed_jobs: i64,
    pub avg_duration_ms: Option<f64>,
    pub uptime_seconds: u64,
}

impl StatsResponse {
    pub fn new(counts: &StatusCounts, uptime_seconds: u64) -> Self {
        Self {
            total_jobs: counts.total(),
            pending_jobs: counts.pending,
            processing_jobs: counts.processing,
            done_jobs: counts.done,
            failed_jobs: counts.failed,
            avg_duration_ms: counts.avg_duration_ms,
            uptime_seconds,
        }
    }
}
