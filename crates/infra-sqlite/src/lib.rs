// Rota Infrastructure - SQLite Adapter
// Implements: JobStore, QueueSource, WorkerRegistry

mod connection;
mod error;
mod job_store;
mod migration;
mod queue_source;
mod worker_registry;

pub use connection::create_pool;
pub use job_store::{QueueStats, SqliteJobStore};
pub use migration::run_migrations;
pub use queue_source::SqliteQueueSource;
pub use worker_registry::{SqliteWorkerRegistry, WorkerRecord, DEFAULT_STALE_AFTER};

// Re-exported so binaries do not need their own sqlx dependency
pub use sqlx::SqlitePool;
