//! Rota Daemon - Main Entry Point
//! Runs N round-robin workers against one SQLite database until Ctrl+C.

mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use rota_core::application::{build_reserver, stop_channel, ReservationPorts, Worker};
use rota_core::port::id_provider::UuidProvider;
use rota_core::port::job_handler::LoggingHandler;
use rota_core::port::time_provider::SystemTimeProvider;
use rota_core::port::{IdProvider, SubscribedQueues};
use rota_core::SchedulerConfig;
use rota_infra_sqlite::{
    create_pool, run_migrations, SqliteJobStore, SqliteQueueSource, SqliteWorkerRegistry,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.rota/rota.db";
const DEFAULT_WORKERS: usize = 1;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("ROTA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    logging::init_logging(&log_format)?;

    info!("Rota daemon v{} starting...", VERSION);

    // 2. Load configuration
    let config = Arc::new(SchedulerConfig::from_env());
    let db_path = std::env::var("ROTA_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let db_path = shellexpand::tilde(&db_path).into_owned();
    let worker_count = worker_count_from_env();

    info!(
        db_path = %db_path,
        workers = worker_count,
        queues = %config.subscription,
        strategy = %config.strategy,
        slice_secs = config.slice_length.as_secs(),
        "Configuration loaded"
    );

    // 3. Initialize database
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_store = Arc::new(SqliteJobStore::new(
        pool.clone(),
        time_provider.clone(),
        id_provider.clone(),
    ));
    let registry = Arc::new(SqliteWorkerRegistry::new(pool.clone(), time_provider.clone()));

    // Workers killed without unregistering would otherwise hold depth slots
    registry
        .prune_stale()
        .await
        .map_err(|e| anyhow::anyhow!("Pruning stale workers failed: {}", e))?;
    let queue_source = Arc::new(SubscribedQueues::new(
        Arc::new(SqliteQueueSource::new(pool.clone())),
        config.subscription.clone(),
    ));
    let handler = Arc::new(LoggingHandler);

    let ports = ReservationPorts {
        queue_source,
        job_store: job_store.clone(),
        registry: registry.clone(),
        time_provider,
    };

    // 5. Start workers
    let (stop_handle, stop_signal) = stop_channel();
    let mut handles = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let worker_id = id_provider.generate_id();
        let reserver = build_reserver(worker_id.clone(), config.clone(), ports.clone());
        let worker = Worker::new(
            worker_id,
            config.subscription.clone(),
            reserver,
            job_store.clone(),
            registry.clone(),
            handler.clone(),
        );
        let signal = stop_signal.clone();

        handles.push(tokio::spawn(async move {
            let worker_id = worker.worker_id().to_string();
            if let Err(e) = worker.run(signal).await {
                error!(worker_id = %worker_id, error = ?e, "Worker failed");
            }
        }));
    }

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping workers...");

    // 7. Graceful shutdown
    stop_handle.stop();
    for handle in handles {
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
            warn!("Worker did not stop in time");
        }
    }

    pool.close().await;
    info!("Shutdown complete.");

    Ok(())
}

fn worker_count_from_env() -> usize {
    match std::env::var("ROTA_WORKERS") {
        Err(_) => DEFAULT_WORKERS,
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!(value = %raw, default = DEFAULT_WORKERS, "Invalid ROTA_WORKERS, using default");
                DEFAULT_WORKERS
            }
        },
    }
}
