// Ingestion loop: watch root -> validator -> store
use crate::application::validation::Validator;
use crate::application::worker::ShutdownToken;
use crate::domain::EnqueueOutcome;
use crate::error::Result;
use crate::port::{DescriptionSource, JobRepository, ScannedDescription};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Counts from one pass over the watch root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
    /// Valid descriptions the store failed to accept this pass
    pub store_errors: usize,
}

impl IngestionReport {
    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Periodically turns description files into queued jobs
///
/// Files are read, never moved or deleted. Invalid files are reported once
/// per distinct reason and skipped until they change.
pub struct IngestionService {
    source: Arc<dyn DescriptionSource>,
    job_repo: Arc<dyn JobRepository>,
    validator: Validator,
    poll_interval: Duration,
    /// Last rejection reason per path, so repeat scans stay quiet
    reported: Mutex<HashMap<PathBuf, String>>,
}

impl IngestionService {
    pub fn new(
        source: Arc<dyn DescriptionSource>,
        job_repo: Arc<dyn JobRepository>,
        validator: Validator,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            job_repo,
            validator,
            poll_interval,
            reported: Mutex::new(HashMap::new()),
        }
    }

    /// One full pass. Per-file problems are reported and skipped; only
    /// listing failures and fatal store errors abort the pass.
    pub async fn scan_once(&self) -> Result<IngestionReport> {
        let entries = self.source.scan().await?;
        let mut report = IngestionReport::default();
        let mut names: HashMap<String, PathBuf> = HashMap::new();
        let mut present: HashSet<PathBuf> = HashSet::new();

        for entry in entries {
            report.scanned += 1;
            present.insert(entry.path.clone());

            let document = match &entry.document {
                Ok(doc) => doc,
                Err(reason) => {
                    self.reject(&entry, &format!("unparseable: {}", reason));
                    report.rejected += 1;
                    continue;
                }
            };

            let job = match self.validator.validate_and_normalize(&entry.name, document) {
                Ok(job) => job,
                Err(e) => {
                    self.reject(&entry, &e.to_string());
                    report.rejected += 1;
                    continue;
                }
            };

            // Only a valid description claims its name for this pass
            if let Some(first) = names.get(&entry.name) {
                let reason = format!(
                    "duplicate job name `{}` (already used by {})",
                    entry.name,
                    first.display()
                );
                self.reject(&entry, &reason);
                report.rejected += 1;
                continue;
            }
            names.insert(entry.name.clone(), entry.path.clone());

            match self.job_repo.enqueue(&job).await {
                Ok(outcome) => {
                    self.forget(&entry.path);
                    match outcome {
                        EnqueueOutcome::Inserted(id) => {
                            report.inserted += 1;
                            info!(job_id = %id, name = %job.name, priority = %job.priority, "Job enqueued");
                        }
                        EnqueueOutcome::Updated(id) => {
                            report.updated += 1;
                            info!(job_id = %id, name = %job.name, "Job description refreshed");
                        }
                        EnqueueOutcome::Unchanged(id, status) => {
                            report.unchanged += 1;
                            debug!(job_id = %id, name = %job.name, status = %status, "Job unchanged");
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.store_errors += 1;
                    warn!(name = %job.name, error = %e, "Failed to enqueue job, retrying next scan");
                }
            }
        }

        self.prune(&present);
        Ok(report)
    }

    /// Scan until shutdown. Returns `Err` only for fatal store errors.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(interval_ms = %self.poll_interval.as_millis(), "Ingestion started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.scan_once().await {
                Ok(report) if report.changed() > 0 || report.store_errors > 0 => {
                    info!(
                        scanned = %report.scanned,
                        inserted = %report.inserted,
                        updated = %report.updated,
                        rejected = %report.rejected,
                        store_errors = %report.store_errors,
                        "Ingestion pass complete"
                    );
                }
                Ok(report) => debug!(scanned = %report.scanned, "Ingestion pass, no changes"),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Ingestion stopping on fatal store error");
                    return Err(e);
                }
                Err(e) => error!(error = %e, "Ingestion pass failed"),
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {},
                _ = shutdown.wait() => break,
            }
        }
        info!("Ingestion stopped");
        Ok(())
    }

    fn reject(&self, entry: &ScannedDescription, reason: &str) {
        let first_time = match self.reported.lock() {
            Ok(mut reported) => match reported.get(&entry.path) {
                Some(previous) if previous == reason => false,
                _ => {
                    reported.insert(entry.path.clone(), reason.to_string());
                    true
                }
            },
            Err(_) => true,
        };

        if first_time {
            warn!(path = %entry.path.display(), reason = %reason, "Skipping invalid job description");
        } else {
            debug!(path = %entry.path.display(), reason = %reason, "Still invalid");
        }
    }

    fn forget(&self, path: &Path) {
        if let Ok(mut reported) = self.reported.lock() {
            reported.remove(path);
        }
    }

    fn prune(&self, present: &HashSet<PathBuf>) {
        if let Ok(mut reported) = self.reported.lock() {
            reported.retain(|path, _| present.contains(path));
        }
    }

    #[cfg(test)]
    fn reported_len(&self) -> usize {
        self.reported.lock().map(|r| r.len()).unwrap_or(0)
    }
}
