//! Rota CLI - inspect and feed the job store a daemon is working on
//!
//! Talks to the SQLite database directly, so it works whether or not a
//! daemon is running.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tabled::{Table, Tabled};

use rota_core::application::BusyQueues;
use rota_core::port::id_provider::UuidProvider;
use rota_core::port::time_provider::SystemTimeProvider;
use rota_core::port::WorkerRegistry;
use rota_core::SchedulerConfig;
use rota_infra_sqlite::{
    create_pool, run_migrations, SqliteJobStore, SqlitePool, SqliteQueueSource,
    SqliteWorkerRegistry,
};

const DEFAULT_DB_PATH: &str = "~/.rota/rota.db";

#[derive(Parser)]
#[command(name = "rota")]
#[command(about = "Rota job queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database shared with the daemon
    #[arg(long, env = "ROTA_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job
    Enqueue {
        /// Queue name
        queue: String,

        /// Payload as JSON string
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Show one job
    Job {
        /// Job ID
        job_id: String,
    },

    /// List queues with job counts, busy depth and configured max depth
    Queues,

    /// List active workers and what they are working on
    Workers,

    /// Forget a queue that has no jobs left
    DropQueue {
        /// Queue name
        queue: String,
    },
}

#[derive(Tabled)]
struct EnqueueRow {
    job_id: String,
    queue: String,
    state: String,
}

#[derive(Tabled)]
struct QueueRow {
    queue: String,
    queued: i64,
    reserved: i64,
    done: i64,
    failed: i64,
    busy: usize,
    max_depth: String,
}

#[derive(Tabled)]
struct WorkerRow {
    worker_id: String,
    queues: String,
    current: String,
    updated: String,
    alive: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let pool = open_db(&cli.db_path).await?;

    let time_provider = Arc::new(SystemTimeProvider);
    let job_store = SqliteJobStore::new(pool.clone(), time_provider.clone(), Arc::new(UuidProvider));
    let registry = SqliteWorkerRegistry::new(pool.clone(), time_provider);

    match cli.command {
        Commands::Enqueue { queue, payload } => {
            let payload_json: serde_json::Value =
                serde_json::from_str(&payload).context("Invalid JSON payload")?;

            let job_id = job_store
                .enqueue(&queue, payload_json)
                .await
                .map_err(|e| anyhow::anyhow!("Enqueue failed: {}", e))?;

            println!("{}", "✓ Job enqueued successfully".green().bold());
            println!();
            let row = EnqueueRow {
                job_id,
                queue,
                state: "QUEUED".to_string(),
            };
            println!("{}", Table::new(vec![row]));
        }

        Commands::Job { job_id } => {
            let job = job_store
                .find_by_id(&job_id)
                .await
                .map_err(|e| anyhow::anyhow!("Lookup failed: {}", e))?;

            match job {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => println!("{}", format!("No job {}", job_id).yellow()),
            }
        }

        Commands::Queues => {
            let config = SchedulerConfig::from_env();
            let stats = job_store
                .queue_stats()
                .await
                .map_err(|e| anyhow::anyhow!("Listing queues failed: {}", e))?;
            let workers = registry
                .list_active_workers()
                .await
                .map_err(|e| anyhow::anyhow!("Listing workers failed: {}", e))?;
            let busy = BusyQueues::from_observations(&workers);

            if stats.is_empty() {
                println!("{}", "No queues yet".yellow());
                return Ok(());
            }

            let rows: Vec<QueueRow> = stats
                .into_iter()
                .map(|s| QueueRow {
                    busy: busy.depth(&s.queue),
                    max_depth: match config.max_depth_for(&s.queue) {
                        0 => "unlimited".to_string(),
                        max => max.to_string(),
                    },
                    queue: s.queue,
                    queued: s.queued,
                    reserved: s.reserved,
                    done: s.done,
                    failed: s.failed,
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Workers => {
            let records = registry
                .list_records()
                .await
                .map_err(|e| anyhow::anyhow!("Listing workers failed: {}", e))?;

            if records.is_empty() {
                println!("{}", "No active workers".yellow());
                return Ok(());
            }

            let rows: Vec<WorkerRow> = records
                .into_iter()
                .map(|r| WorkerRow {
                    alive: if registry.is_stale(&r) { "stale" } else { "yes" }.to_string(),
                    worker_id: r.worker_id,
                    queues: r.subscription,
                    current: r.current_queue.unwrap_or_else(|| "idle".to_string()),
                    updated: format_millis(r.updated_at),
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::DropQueue { queue } => {
            let removed = SqliteQueueSource::new(pool.clone())
                .remove_queue(&queue)
                .await
                .map_err(|e| anyhow::anyhow!("Dropping queue failed: {}", e))?;

            if removed {
                println!("{}", format!("✓ Queue {} dropped", queue).green().bold());
            } else {
                println!(
                    "{}",
                    format!("Queue {} is unknown or still has jobs", queue).yellow()
                );
            }
        }
    }

    pool.close().await;
    Ok(())
}

async fn open_db(raw_path: &str) -> Result<SqlitePool> {
    let db_path = shellexpand::tilde(raw_path).into_owned();
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }

    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", db_path, e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    Ok(pool)
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
