//! Control surface: operator actions through ControlService and JSON-RPC

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_worker_config, file_store, new_job, worker};
use gantry_api_rpc::{RpcServer, RpcServerConfig};
use gantry_core::application::ControlService;
use gantry_core::domain::{JobStatus, QueuePolicy};
use gantry_core::error::AppError;
use gantry_core::port::backend::mocks::ScriptedBackend;
use gantry_core::port::time_provider::SystemTimeProvider;
use gantry_core::port::TimeProvider;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde_json::Value;

const LEASE: Duration = Duration::from_secs(60);

/// God mode jumps a job ahead of everything already waiting
#[tokio::test]
async fn test_god_mode_runs_next() {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = file_store(time.clone()).await;
    for (name, priority) in [("urgent.yaml", 2), ("normal.yaml", 50), ("late.yaml", 900)] {
        store.repo.enqueue(&new_job(name, priority, 2)).await.unwrap();
    }
    let control = ControlService::new(store.repo.clone(), QueuePolicy::default());

    let promoted = control.god_mode("late.yaml").await.unwrap();
    assert_eq!(promoted.priority, 1);

    let next = store.repo.lease_next("worker-a", LEASE).await.unwrap().unwrap();
    assert_eq!(next.name, "late.yaml");
}

/// Manual retry gives a failed job a fresh budget; other states are refused
#[tokio::test]
async fn test_manual_retry_of_failed_job() {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = file_store(time.clone()).await;
    store.repo.enqueue(&new_job("T2I_flaky.yaml", 50, 1)).await.unwrap();
    let control = ControlService::new(store.repo.clone(), QueuePolicy::default());

    // Pending jobs cannot be retried
    let err = control.manual_retry("T2I_flaky.yaml").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let backend = Arc::new(ScriptedBackend::failing_times(1));
    let worker = worker("worker-a", store.repo.clone(), backend, time, &fast_worker_config());
    worker.process_next_job().await.unwrap();
    assert_eq!(control.get_job("T2I_flaky.yaml").await.unwrap().status, JobStatus::Failed);

    let retried = control.manual_retry("T2I_flaky.yaml").await.unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retries_used, 0);
    assert!(retried.error.is_none());

    worker.process_next_job().await.unwrap();
    let job = control.get_job("T2I_flaky.yaml").await.unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.run_count, 2);
}

/// Retrying a job that is being executed is refused and changes nothing
#[tokio::test]
async fn test_manual_retry_of_processing_job_refused() {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = file_store(time).await;
    store.repo.enqueue(&new_job("T2I_busy.yaml", 50, 2)).await.unwrap();
    let leased = store.repo.lease_next("worker-a", LEASE).await.unwrap().unwrap();
    let control = ControlService::new(store.repo.clone(), QueuePolicy::default());

    let err = control.manual_retry("T2I_busy.yaml").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let job = control.get_job("T2I_busy.yaml").await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.lease_owner.as_deref(), Some("worker-a"));
    assert_eq!(job.lease_expires_at, leased.lease_expires_at);
    assert_eq!(job.run_count, 1);
    assert_eq!(job.retries_used, 0);
    assert_eq!(job.updated_at, leased.updated_at);

    // The lessee can still complete it
    store
        .repo
        .record_success(leased.id, "worker-a", &serde_json::json!({"artifacts": []}))
        .await
        .unwrap();
}

/// Priority can be edited in any state and is always clamped
#[tokio::test]
async fn test_set_priority_any_state() {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = file_store(time).await;
    store.repo.enqueue(&new_job("busy.yaml", 50, 2)).await.unwrap();
    store.repo.lease_next("worker-a", LEASE).await.unwrap().unwrap();
    let control = ControlService::new(store.repo.clone(), QueuePolicy::default());

    let job = control.set_priority("busy.yaml", 10_000).await.unwrap();
    assert_eq!(job.priority, 999);
    assert_eq!(job.status, JobStatus::Processing);

    let err = control.set_priority("missing.yaml", 5).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

async fn rpc_client(control: Arc<ControlService>) -> (HttpClient, jsonrpsee::server::ServerHandle) {
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, control).start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle)
}

fn named(pairs: &[(&str, Value)]) -> ObjectParams {
    let mut params = ObjectParams::new();
    for (key, value) in pairs {
        params.insert(key, value.clone()).unwrap();
    }
    params
}

fn error_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected a call error, got {:?}", other),
    }
}

/// Every method over real HTTP, including the stable error codes
#[tokio::test]
async fn test_rpc_methods_round_trip() {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = file_store(time).await;
    store.repo.enqueue(&new_job("a.yaml", 20, 2)).await.unwrap();
    store.repo.enqueue(&new_job("b.yaml", 50, 2)).await.unwrap();
    let control = Arc::new(ControlService::new(store.repo.clone(), QueuePolicy::default()));
    let (client, handle) = rpc_client(control).await;

    let listing: Value = client.request("queue.list.v1", rpc_params![]).await.unwrap();
    assert_eq!(listing["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(listing["jobs"][0]["name"], "a.yaml");

    let filtered: Value = client
        .request("queue.list.v1", named(&[("status", "done".into())]))
        .await
        .unwrap();
    assert!(filtered["jobs"].as_array().unwrap().is_empty());

    let shown: Value = client
        .request("queue.get.v1", named(&[("name", "b.yaml".into())]))
        .await
        .unwrap();
    assert_eq!(shown["job"]["status"], "pending");
    assert_eq!(shown["job"]["payload"]["outputs"]["file_path"], "out/b.yaml.png");

    let edited: Value = client
        .request(
            "queue.set_priority.v1",
            named(&[("name", "b.yaml".into()), ("priority", 0.into())]),
        )
        .await
        .unwrap();
    assert_eq!(edited["job"]["priority"], 1);

    let promoted: Value = client
        .request("queue.god_mode.v1", named(&[("name", "a.yaml".into())]))
        .await
        .unwrap();
    assert_eq!(promoted["job"]["priority"], 1);

    let stats: Value = client.request("admin.stats.v1", rpc_params![]).await.unwrap();
    assert_eq!(stats["total_jobs"], 2);
    assert_eq!(stats["pending_jobs"], 2);
    assert!(stats["avg_duration_ms"].is_null());

    let missing = client
        .request::<Value, _>("queue.get.v1", named(&[("name", "nope.yaml".into())]))
        .await
        .unwrap_err();
    assert_eq!(error_code(missing), 4001);

    let not_failed = client
        .request::<Value, _>("queue.retry.v1", named(&[("name", "a.yaml".into())]))
        .await
        .unwrap_err();
    assert_eq!(error_code(not_failed), 4002);

    let bad_status = client
        .request::<Value, _>("queue.list.v1", named(&[("status", "running".into())]))
        .await
        .unwrap_err();
    assert_eq!(error_code(bad_status), 4000);

    handle.stop().unwrap();
    println!("✅ Control surface: all methods and error codes over HTTP");
}
