// Orphan recovery: reclaim processing jobs whose lease expired
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Returns abandoned work to the queue
///
/// A job stays `processing` only while its lease is live. Once the lease
/// expires (its worker crashed, hung, or was killed) the job goes back to
/// `pending` without touching its retry accounting. Runs once at startup and
/// before every lease attempt.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(job_repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            job_repo,
            time_provider,
        }
    }

    /// Number of jobs returned to pending
    pub async fn recover(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let recovered = self.job_repo.recover_orphans(now).await?;

        if recovered > 0 {
            info!(recovered = %recovered, "Requeued jobs with expired leases");
        } else {
            debug!("No orphaned jobs");
        }
        Ok(recovered)
    }
}
