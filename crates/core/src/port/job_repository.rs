// Job Repository Port (Interface)
//
// Each mutating operation must be a single atomic step against concurrent
// callers; the store is the only coordination point between loops.

use crate::domain::{EnqueueOutcome, Job, JobId, JobStatus, NewJob, StatusCounts};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Repository interface for the job record store
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert by unique name, or refresh a known non-terminal job.
    /// Never creates a second row and never regresses a terminal job.
    async fn enqueue(&self, job: &NewJob) -> Result<EnqueueOutcome>;

    /// Claim the pending job with the lowest (priority, id).
    /// Returns `None` when nothing is pending.
    async fn lease_next(&self, worker_id: &str, lease_duration: Duration) -> Result<Option<Job>>;

    /// Mark a job leased by `worker_id` as done and persist its result
    async fn record_success(
        &self,
        id: JobId,
        worker_id: &str,
        result: &serde_json::Value,
    ) -> Result<Job>;

    /// Count a failed attempt; requeues while budget remains, else fails terminally
    async fn record_failure(&self, id: JobId, worker_id: &str, error: &str) -> Result<Job>;

    /// Reset processing jobs whose lease expired before `now_millis`
    async fn recover_orphans(&self, now_millis: i64) -> Result<u64>;

    /// Control surface: clamp and set priority at any status
    async fn set_priority(&self, name: &str, priority: i64) -> Result<Job>;

    /// Control surface: failed -> pending with retry budget reset
    async fn manual_retry(&self, name: &str) -> Result<Job>;

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Job>>;

    /// List jobs in lease order (priority, id), optionally filtered by status
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>>;

    async fn stats(&self) -> Result<StatusCounts>;
}
