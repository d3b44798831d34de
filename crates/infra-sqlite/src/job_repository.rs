// SQLite JobRepository Implementation
//
// Every operation is one statement (or a read after a no-op statement), so
// SQLite's writer lock is the only serialization point between loops.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use gantry_core::domain::{
    EnqueueOutcome, Job, JobId, JobKind, JobPayload, JobStatus, NewJob, QueuePolicy,
    StatusCounts,
};
use gantry_core::error::{AppError, Result};
use gantry_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    policy: QueuePolicy,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>, policy: QueuePolicy) -> Self {
        Self {
            pool,
            time_provider,
            policy,
        }
    }

    /// Explain why a guarded single-row update matched nothing
    async fn explain_miss(&self, id: JobId, expected: &str) -> AppError {
        let current: std::result::Result<Option<String>, _> =
            sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(None) => AppError::NotFound(format!("job {}", id)),
            Ok(Some(status)) => {
                AppError::InvalidState(format!("job {} is {}, expected {}", id, status, expected))
            }
            Err(e) => map_sqlx_error(e),
        }
    }

    async fn status_by_name(&self, name: &str) -> Result<Option<(JobId, String)>> {
        sqlx::query_as("SELECT id, status FROM jobs WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn enqueue(&self, job: &NewJob) -> Result<EnqueueOutcome> {
        let now = self.time_provider.now_millis();
        let priority = self.policy.clamp_priority(job.priority as i64);
        let payload = job.payload.as_value().to_string();
        let metadata = job.metadata.as_ref().map(|m| m.to_string());

        let inserted: Option<JobId> = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (
                name, kind, workflow_ref, priority, status,
                retry_limit, payload, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&job.name)
        .bind(job.kind.as_str())
        .bind(&job.workflow_ref)
        .bind(priority)
        .bind(job.retry_limit)
        .bind(&payload)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(id) = inserted {
            return Ok(EnqueueOutcome::Inserted(id));
        }

        // Known name: refresh descriptive fields of a live job only.
        // Priority is left alone so operator edits survive rescans.
        // A lowered retry_limit never leaves retries_used above it; a pending
        // job whose budget is already spent becomes failed.
        let updated: Option<JobId> = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET kind = ?1, workflow_ref = ?2, retry_limit = ?3,
                payload = ?4, metadata = ?5, updated_at = ?6,
                status = CASE WHEN status = 'pending' AND retries_used >= ?3
                              THEN 'failed' ELSE status END,
                retries_used = MIN(retries_used, ?3)
            WHERE name = ?7
              AND status IN ('pending', 'processing')
              AND (kind IS NOT ?1 OR workflow_ref IS NOT ?2 OR retry_limit IS NOT ?3
                   OR payload IS NOT ?4 OR metadata IS NOT ?5)
            RETURNING id
            "#,
        )
        .bind(job.kind.as_str())
        .bind(&job.workflow_ref)
        .bind(job.retry_limit)
        .bind(&payload)
        .bind(&metadata)
        .bind(now)
        .bind(&job.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(id) = updated {
            return Ok(EnqueueOutcome::Updated(id));
        }

        match self.status_by_name(&job.name).await? {
            Some((id, status)) => Ok(EnqueueOutcome::Unchanged(id, parse_status(&status)?)),
            None => Err(AppError::Store(format!(
                "job `{}` vanished during enqueue",
                job.name
            ))),
        }
    }

    async fn lease_next(&self, worker_id: &str, lease_duration: Duration) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();
        let expires_at = now.saturating_add(lease_duration.as_millis() as i64);

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'processing',
                lease_owner = ?, lease_expires_at = ?,
                started_at = ?, ended_at = NULL, duration_ms = NULL,
                run_count = run_count + 1, updated_at = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                ORDER BY priority ASC, id ASC
                LIMIT 1
            )
              AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Job::try_from).transpose()
    }

    async fn record_success(
        &self,
        id: JobId,
        worker_id: &str,
        result: &serde_json::Value,
    ) -> Result<Job> {
        let now = self.time_provider.now_millis();

        // `error` is kept: it describes the last failed attempt
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'done', result = ?,
                lease_owner = NULL, lease_expires_at = NULL,
                ended_at = ?, duration_ms = ? - COALESCE(started_at, ?),
                updated_at = ?
            WHERE id = ? AND status = 'processing' AND lease_owner = ?
            RETURNING *
            "#,
        )
        .bind(result.to_string())
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self
                .explain_miss(id, &format!("processing under lease of {}", worker_id))
                .await),
        }
    }

    async fn record_failure(&self, id: JobId, worker_id: &str, error: &str) -> Result<Job> {
        let now = self.time_provider.now_millis();

        // SET expressions all see the pre-update row
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = CASE WHEN retries_used + 1 < retry_limit
                              THEN 'pending' ELSE 'failed' END,
                retries_used = MIN(retries_used + 1, retry_limit),
                error = ?,
                lease_owner = NULL, lease_expires_at = NULL,
                ended_at = ?, duration_ms = ? - COALESCE(started_at, ?),
                updated_at = ?
            WHERE id = ? AND status = 'processing' AND lease_owner = ?
            RETURNING *
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self
                .explain_miss(id, &format!("processing under lease of {}", worker_id))
                .await),
        }
    }

    async fn recover_orphans(&self, now_millis: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', lease_owner = NULL, lease_expires_at = NULL,
                updated_at = ?
            WHERE status = 'processing'
              AND (lease_expires_at IS NULL OR lease_expires_at < ?)
            "#,
        )
        .bind(now_millis)
        .bind(now_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn set_priority(&self, name: &str, priority: i64) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let clamped = self.policy.clamp_priority(priority);
        if clamped as i64 != priority {
            debug!(name = %name, requested = %priority, applied = %clamped, "Priority clamped");
        }

        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE jobs SET priority = ?, updated_at = ? WHERE name = ? RETURNING *",
        )
        .bind(clamped)
        .bind(now)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Job::try_from)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("job `{}`", name)))
    }

    async fn manual_retry(&self, name: &str) -> Result<Job> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'pending', retries_used = 0, error = NULL,
                lease_owner = NULL, lease_expires_at = NULL, updated_at = ?
            WHERE name = ? AND status = 'failed'
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Job::try_from(row);
        }

        match self.status_by_name(name).await? {
            None => Err(AppError::NotFound(format!("job `{}`", name))),
            Some((_, status)) => Err(AppError::InvalidState(format!(
                "job `{}` is {}; only failed jobs can be retried",
                name, status
            ))),
        }
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Job::try_from).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Job::try_from).transpose()
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM jobs WHERE status = ? ORDER BY priority ASC, id ASC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as("SELECT * FROM jobs ORDER BY priority ASC, id ASC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn stats(&self) -> Result<StatusCounts> {
        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let avg_duration_ms: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(duration_ms) FROM jobs WHERE status = 'done' AND duration_ms IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut stats = StatusCounts {
            avg_duration_ms,
            ..Default::default()
        };
        for (status, count) in counts {
            match parse_status(&status)? {
                JobStatus::Pending => stats.pending = count,
                JobStatus::Processing => stats.processing = count,
                JobStatus::Done => stats.done = count,
                JobStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }
}

fn parse_status(s: &str) -> Result<JobStatus> {
    s.parse::<JobStatus>()
        .map_err(|e| AppError::StoreCorrupted(e.to_string()))
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    name: String,
    kind: String,
    workflow_ref: String,
    priority: i32,
    status: String,

    run_count: i32,
    retries_used: i32,
    retry_limit: i32,

    lease_owner: Option<String>,
    lease_expires_at: Option<i64>,

    started_at: Option<i64>,
    ended_at: Option<i64>,
    duration_ms: Option<i64>,

    error: Option<String>,
    payload: String,
    metadata: Option<String>,
    result: Option<String>,

    created_at: i64,
    updated_at: i64,
}

fn parse_json(column: &str, id: i64, raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| {
        AppError::StoreCorrupted(format!("job {} has invalid JSON in `{}`: {}", id, column, e))
    })
}

impl TryFrom<JobRow> for Job {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = parse_status(&row.status)?;
        let payload = parse_json("payload", row.id, &row.payload)?;
        let metadata = row
            .metadata
            .as_deref()
            .map(|m| parse_json("metadata", row.id, m))
            .transpose()?;
        let result = row
            .result
            .as_deref()
            .map(|r| parse_json("result", row.id, r))
            .transpose()?;

        Ok(Job {
            id: row.id,
            name: row.name,
            kind: JobKind::new(row.kind),
            workflow_ref: row.workflow_ref,
            priority: row.priority,
            status,
            run_count: row.run_count,
            retries_used: row.retries_used,
            retry_limit: row.retry_limit,
            lease_owner: row.lease_owner,
            lease_expires_at: row.lease_expires_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_ms: row.duration_ms,
            error: row.error,
            payload: JobPayload::new(payload),
            metadata,
            result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
