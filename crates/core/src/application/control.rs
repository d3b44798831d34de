// Control surface use cases: inspect the queue and adjust it by name
use crate::domain::{Job, JobStatus, QueuePolicy, StatusCounts};
use crate::error::{AppError, Result};
use crate::port::JobRepository;
use std::sync::Arc;
use tracing::info;

/// Operator actions over the store
///
/// Every mutation is a single store operation, so edits interleave safely
/// with the ingestion and execution loops.
pub struct ControlService {
    job_repo: Arc<dyn JobRepository>,
    policy: QueuePolicy,
}

impl ControlService {
    pub fn new(job_repo: Arc<dyn JobRepository>, policy: QueuePolicy) -> Self {
        Self { job_repo, policy }
    }

    /// Jobs in lease order, optionally filtered
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        self.job_repo.list(status).await
    }

    pub async fn get_job(&self, name: &str) -> Result<Job> {
        self.job_repo
            .find_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job `{}`", name)))
    }

    /// Out-of-range values are clamped to the queue's bounds
    pub async fn set_priority(&self, name: &str, priority: i64) -> Result<Job> {
        let job = self.job_repo.set_priority(name, priority).await?;
        info!(name = %name, requested = %priority, priority = %job.priority, "Priority changed");
        Ok(job)
    }

    /// Move a job to the front of the queue
    pub async fn god_mode(&self, name: &str) -> Result<Job> {
        self.set_priority(name, self.policy.top_priority() as i64)
            .await
    }

    /// failed -> pending with a fresh retry budget
    pub async fn manual_retry(&self, name: &str) -> Result<Job> {
        let job = self.job_repo.manual_retry(name).await?;
        info!(job_id = %job.id, name = %name, "Manual retry requested");
        Ok(job)
    }

    pub async fn stats(&self) -> Result<StatusCounts> {
        self.job_repo.stats().await
    }
}
