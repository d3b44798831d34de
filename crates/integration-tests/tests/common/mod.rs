//! Shared fixtures for the integration scenarios
#![allow(dead_code)]

use std::sync::Arc;

use gantry_core::application::{RecoveryService, Validator, Worker};
use gantry_core::config::WorkerConfig;
use gantry_core::domain::{
    JobKind, JobPayload, NewJob, QueuePolicy, WorkflowRegistry, WorkflowSpec,
};
use gantry_core::port::{GenerationBackend, JobRepository, TimeProvider};
use gantry_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// File-backed store; the directory lives as long as this value
pub struct TestStore {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub repo: Arc<dyn JobRepository>,
}

pub async fn file_store(time: Arc<dyn TimeProvider>) -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("gantry.db").display());
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(
        pool.clone(),
        time,
        QueuePolicy::default(),
    ));
    TestStore { dir, pool, repo }
}

/// Reopen the same database file, as a restarted agent would
pub async fn reopen(store: &TestStore, time: Arc<dyn TimeProvider>) -> Arc<dyn JobRepository> {
    let url = format!("sqlite://{}", store.dir.path().join("gantry.db").display());
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobRepository::new(pool, time, QueuePolicy::default()))
}

pub fn workflows() -> Arc<WorkflowRegistry> {
    let mut registry = WorkflowRegistry::default();
    registry.insert(
        "wf_portrait",
        WorkflowSpec {
            template_path: "portrait.json".to_string(),
            required_inputs: vec!["prompt".to_string()],
        },
    );
    registry.insert(
        "wf_voice",
        WorkflowSpec {
            template_path: "voice.json".to_string(),
            required_inputs: vec!["text".to_string()],
        },
    );
    Arc::new(registry)
}

pub fn validator() -> Validator {
    Validator::new(
        vec!["T2I".to_string(), "SPEECH".to_string()],
        workflows(),
        QueuePolicy::default(),
    )
}

pub fn new_job(name: &str, priority: i32, retry_limit: i32) -> NewJob {
    NewJob {
        name: name.to_string(),
        kind: JobKind::new("T2I"),
        workflow_ref: "wf_portrait".to_string(),
        priority,
        retry_limit,
        payload: JobPayload::new(json!({
            "inputs": {"prompt": format!("scene for {}", name)},
            "outputs": {"file_path": format!("out/{}.png", name)}
        })),
        metadata: None,
    }
}

/// Description file contents accepted by `validator()`
pub fn description_yaml(priority: i32, retry_limit: i32) -> String {
    format!(
        "kind: T2I\nworkflow_ref: wf_portrait\npriority: {}\nretry_limit: {}\npayload:\n  inputs:\n    45_text: a lighthouse at dusk\n  outputs:\n    file_path: out/lighthouse.png\n",
        priority, retry_limit
    )
}

/// Short timings so loops turn over quickly
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        worker_id: None,
        lease_duration_ms: 60_000,
        backend_timeout_ms: 2_000,
        idle_poll_ms: 10,
        backoff_base_ms: 0,
        backoff_max_ms: 0,
    }
}

pub fn worker(
    worker_id: &str,
    repo: Arc<dyn JobRepository>,
    backend: Arc<dyn GenerationBackend>,
    time: Arc<dyn TimeProvider>,
    config: &WorkerConfig,
) -> Worker {
    let recovery = Arc::new(RecoveryService::new(repo.clone(), time));
    Worker::new(worker_id, repo, backend, recovery, config)
}
