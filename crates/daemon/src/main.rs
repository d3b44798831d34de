//! Gantry Agent - Main Entry Point
//! Ingestion loop + execution loop + JSON-RPC control surface

mod logging;
mod settings;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use gantry_api_rpc::{RpcServer, RpcServerConfig};
use gantry_core::application::worker::constants::WORKER_ID_PREFIX;
use gantry_core::application::{
    shutdown_channel, ControlService, IngestionService, RecoveryService, Validator, Worker,
};
use gantry_core::port::time_provider::SystemTimeProvider;
use gantry_core::port::{JobRepository, TimeProvider};
use gantry_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use gantry_infra_system::{load_workflows, FsDescriptionSource, HttpBackend};

/// How long an in-flight job may keep running after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = logging::init_logging()?;
    info!("Gantry agent v{} starting...", gantry_core::VERSION);

    // 2. Load configuration
    let config = settings::load()?;
    info!(
        config_file = %settings::config_path().display(),
        watch_root = %config.ingestion.watch_root.display(),
        db_path = %config.paths.database.display(),
        backend = %config.backend.base_url,
        "Configuration loaded"
    );

    // 3. Initialize database
    tokio::fs::create_dir_all(&config.ingestion.watch_root)
        .await
        .with_context(|| {
            format!(
                "failed to create watch root {}",
                config.ingestion.watch_root.display()
            )
        })?;
    if let Some(parent) = config.paths.database.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_url = format!("sqlite://{}", config.paths.database.display());
    let pool = create_pool(&db_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    let workflows = Arc::new(
        load_workflows(&config.paths.workflows).context("failed to load workflow registry")?,
    );
    info!(workflows = workflows.len(), "Workflow registry loaded");

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(
        pool.clone(),
        time_provider.clone(),
        config.queue.clone(),
    ));
    let backend = Arc::new(
        HttpBackend::new(&config.backend, workflows.clone()).context("backend setup failed")?,
    );
    let recovery = Arc::new(RecoveryService::new(job_repo.clone(), time_provider.clone()));
    let validator = Validator::new(
        config.known_kinds.clone(),
        workflows.clone(),
        config.queue.clone(),
    );
    let source = Arc::new(FsDescriptionSource::new(
        config.ingestion.watch_root.clone(),
        config.ingestion.extensions.clone(),
    ));
    let ingestion = IngestionService::new(
        source,
        job_repo.clone(),
        validator,
        config.ingestion.poll_interval(),
    );
    let control = Arc::new(ControlService::new(job_repo.clone(), config.queue.clone()));

    // 5. Run crash recovery before anything can lease
    info!("Running crash recovery...");
    let recovered = recovery.recover().await.context("Crash recovery failed")?;
    info!(recovered_jobs = recovered, "Crash recovery completed");

    // 6. Start JSON-RPC server
    let (rpc_addr, rpc_handle) = RpcServer::new(RpcServerConfig::from(&config.rpc), control)
        .start()
        .await
        .map_err(|e| anyhow!("RPC server start failed: {}", e))?;
    info!(addr = %rpc_addr, "Control surface listening");

    // 7. Start ingestion and execution loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let worker_id = config
        .worker
        .worker_id
        .clone()
        .unwrap_or_else(|| format!("{}-{}", WORKER_ID_PREFIX, uuid::Uuid::new_v4()));
    let worker = Worker::new(worker_id, job_repo, backend, recovery, &config.worker);
    info!(worker_id = %worker.worker_id(), "Starting worker...");

    let mut worker_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { worker.run(shutdown).await }
    });
    let mut ingestion_task = tokio::spawn(async move { ingestion.run(shutdown_rx).await });

    info!("System ready. Press Ctrl+C to shutdown");

    // 8. Wait for Ctrl+C or a loop that stopped on its own
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received. Exiting gracefully...");
            Ok(())
        }
        joined = &mut worker_task => loop_exit("execution", joined),
        joined = &mut ingestion_task => loop_exit("ingestion", joined),
    };

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    if rpc_handle.stop().is_err() {
        warn!("RPC server was already stopped");
    }
    for (name, task) in [("execution", worker_task), ("ingestion", ingestion_task)] {
        if task.is_finished() {
            continue;
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(joined) => {
                if let Err(e) = loop_exit(name, joined) {
                    error!(error = %format!("{:#}", e), "Loop failed during shutdown");
                }
            }
            Err(_) => warn!(
                loop_name = name,
                "Loop still busy after grace period; its lease will be recovered on next start"
            ),
        }
    }

    match &outcome {
        Ok(()) => info!("Shutdown complete."),
        Err(e) => error!(error = %format!("{:#}", e), "Agent stopped on error"),
    }
    outcome
}

fn loop_exit(name: &str, joined: std::result::Result<gantry_core::Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            info!(loop_name = name, "Loop stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::Error::new(e).context(format!("{} loop stopped", name))),
        Err(e) => Err(anyhow!("{} loop task failed: {}", name, e)),
    }
}
