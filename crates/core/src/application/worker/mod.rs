// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::recovery::RecoveryService;
use crate::application::retry::BackoffPolicy;
use crate::config::WorkerConfig;
use crate::domain::{Job, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{BackendError, BackendOutcome, GenerationBackend, JobRepository};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Leases one job at a time and drives it through the generation backend
pub struct Worker {
    worker_id: String,
    job_repo: Arc<dyn JobRepository>,
    backend: Arc<dyn GenerationBackend>,
    recovery: Arc<RecoveryService>,
    backoff: BackoffPolicy,
    lease_duration: Duration,
    backend_timeout: Duration,
    idle_poll: Duration,
    /// Transient backend failures since the last success or permanent failure
    transient_streak: AtomicU32,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        job_repo: Arc<dyn JobRepository>,
        backend: Arc<dyn GenerationBackend>,
        recovery: Arc<RecoveryService>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            job_repo,
            backend,
            recovery,
            backoff: BackoffPolicy::from_config(config),
            lease_duration: config.lease_duration(),
            backend_timeout: config.backend_timeout(),
            idle_poll: config.idle_poll(),
            transient_streak: AtomicU32::new(0),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// An in-flight job always finishes before the loop notices shutdown.
    /// Returns `Err` only for fatal store errors.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = %self.worker_id, "Worker started");
        loop {
            // Check for shutdown signal
            if shutdown.is_shutdown() {
                info!(worker_id = %self.worker_id, "Worker shutting down");
                break;
            }

            let pause = match self.process_next_job().await {
                Ok(true) => self.current_backoff(),
                Ok(false) => self.idle_poll,
                Err(e) if e.is_fatal() => {
                    error!(worker_id = %self.worker_id, error = %e, "Worker stopping on fatal store error");
                    return Err(e);
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Worker error");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };

            if pause.is_zero() {
                continue;
            }
            tokio::select! {
                _ = sleep(pause) => {},
                _ = shutdown.wait() => {
                    info!(worker_id = %self.worker_id, "Worker interrupted while waiting");
                    break;
                }
            }
        }
        info!(worker_id = %self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Recover orphans, lease the next job and run it (returns true if a job was leased)
    pub async fn process_next_job(&self) -> Result<bool> {
        self.recovery.recover().await?;

        let job = match self
            .job_repo
            .lease_next(&self.worker_id, self.lease_duration)
            .await?
        {
            Some(j) => j,
            None => return Ok(false), // No job available
        };

        info!(
            job_id = %job.id,
            name = %job.name,
            workflow_ref = %job.workflow_ref,
            attempt = %job.run_count,
            "Processing job"
        );

        let outcome = self.execute(&job).await;

        match outcome {
            Ok(result) => {
                self.transient_streak.store(0, Ordering::Relaxed);
                let meta = result.to_result_metadata();
                match self
                    .job_repo
                    .record_success(job.id, &self.worker_id, &meta)
                    .await
                {
                    Ok(done) => info!(
                        job_id = %done.id,
                        name = %done.name,
                        duration_ms = ?done.duration_ms,
                        artifacts = ?result.artifacts,
                        "Job completed"
                    ),
                    Err(AppError::InvalidState(reason)) => self.lease_lost(&job, &reason),
                    Err(e) => return Err(e),
                }
            }
            Err(backend_err) => {
                if backend_err.is_transient() {
                    self.transient_streak.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.transient_streak.store(0, Ordering::Relaxed);
                }

                let message = backend_err.to_string();
                match self
                    .job_repo
                    .record_failure(job.id, &self.worker_id, &message)
                    .await
                {
                    Ok(updated) if updated.status == JobStatus::Failed => error!(
                        job_id = %updated.id,
                        name = %updated.name,
                        retries_used = %updated.retries_used,
                        retry_limit = %updated.retry_limit,
                        error = %message,
                        "Job failed permanently"
                    ),
                    Ok(updated) => warn!(
                        job_id = %updated.id,
                        name = %updated.name,
                        retries_used = %updated.retries_used,
                        retry_limit = %updated.retry_limit,
                        error = %message,
                        "Job attempt failed, requeued"
                    ),
                    Err(AppError::InvalidState(reason)) => self.lease_lost(&job, &reason),
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(true)
    }

    /// Call the backend on its own task so a panic or hang stays contained
    async fn execute(&self, job: &Job) -> std::result::Result<BackendOutcome, BackendError> {
        let backend = Arc::clone(&self.backend);
        let workflow_ref = job.workflow_ref.clone();
        let payload = job.payload.clone();
        let timeout = self.backend_timeout;

        let handle = tokio::task::spawn(async move {
            match tokio::time::timeout(timeout, backend.submit(&workflow_ref, &payload, timeout))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
            }
        });

        // Await the spawned task - panics will be caught by JoinHandle
        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                let panic = join_err.into_panic();
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(job_id = %job.id, panic = %message, "Backend call panicked");
                Err(BackendError::Panicked(message))
            }
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "Backend call cancelled");
                Err(BackendError::Panicked("backend task cancelled".to_string()))
            }
        }
    }

    /// Pause owed to the backend after a run of transient failures
    fn current_backoff(&self) -> Duration {
        let streak = self.transient_streak.load(Ordering::Relaxed);
        let delay = self.backoff.delay(streak, &self.worker_id);
        if !delay.is_zero() {
            debug!(
                worker_id = %self.worker_id,
                consecutive_failures = %streak,
                delay_ms = %delay.as_millis(),
                "Backing off after transient backend failures"
            );
        }
        delay
    }

    /// Our lease was reclaimed while the call ran; another worker owns the job now
    fn lease_lost(&self, job: &Job, reason: &str) {
        warn!(
            job_id = %job.id,
            name = %job.name,
            worker_id = %self.worker_id,
            reason = %reason,
            "Lease lost before completion, discarding outcome"
        );
    }
}
