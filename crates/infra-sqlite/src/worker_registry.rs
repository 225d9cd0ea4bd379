// SQLite WorkerRegistry Implementation
//
// Shared by every worker process pointed at the same database file, so depth
// limits hold across processes, not only across tasks in one daemon.
//
// Rows whose `updated_at` is older than the staleness window belong to
// workers that died without unregistering. They are invisible to
// `list_active_workers` and removed by `prune_stale`.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use rota_core::domain::{Subscription, WorkerObservation};
use rota_core::error::{AppError, Result};
use rota_core::port::{TimeProvider, WorkerRegistry};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default staleness window; several missed heartbeats before a worker is dead
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// One row of the `workers` table, for display
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub subscription: String,
    pub current_queue: Option<String>,
    pub started_at: i64,
    pub updated_at: i64,
}

pub struct SqliteWorkerRegistry {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    stale_after: Duration,
}

impl SqliteWorkerRegistry {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Oldest `updated_at` still counted as alive
    fn alive_since(&self) -> i64 {
        let window = i64::try_from(self.stale_after.as_millis()).unwrap_or(i64::MAX);
        self.time_provider.now_millis().saturating_sub(window)
    }

    pub fn is_stale(&self, record: &WorkerRecord) -> bool {
        record.updated_at < self.alive_since()
    }

    /// Delete workers that stopped heartbeating. Returns how many were removed.
    pub async fn prune_stale(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM workers WHERE updated_at < ?")
            .bind(self.alive_since())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            info!(pruned, "Pruned stale workers");
        }
        Ok(pruned)
    }

    pub async fn list_records(&self) -> Result<Vec<WorkerRecord>> {
        sqlx::query_as::<_, WorkerRecord>("SELECT * FROM workers ORDER BY worker_id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn set_current_queue(&self, worker_id: &str, queue: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE workers SET current_queue = ?, updated_at = ? WHERE worker_id = ?",
        )
        .bind(queue)
        .bind(self.time_provider.now_millis())
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Worker {}", worker_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerRegistry for SqliteWorkerRegistry {
    async fn list_active_workers(&self) -> Result<Vec<WorkerObservation>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT worker_id, current_queue FROM workers
            WHERE updated_at >= ?
            ORDER BY worker_id
            "#,
        )
        .bind(self.alive_since())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(worker_id, queue)| WorkerObservation { worker_id, queue })
            .collect())
    }

    async fn register(&self, worker_id: &str, subscription: &Subscription) -> Result<()> {
        let now = self.time_provider.now_millis();
        sqlx::query(
            r#"
            INSERT INTO workers (worker_id, subscription, current_queue, started_at, updated_at)
            VALUES (?, ?, NULL, ?, ?)
            ON CONFLICT(worker_id) DO UPDATE SET
                subscription = excluded.subscription,
                current_queue = NULL,
                started_at = excluded.started_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(worker_id)
        .bind(subscription.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn set_working(&self, worker_id: &str, queue: &str) -> Result<()> {
        self.set_current_queue(worker_id, Some(queue)).await
    }

    async fn set_idle(&self, worker_id: &str) -> Result<()> {
        self.set_current_queue(worker_id, None).await
    }

    async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE workers SET updated_at = ? WHERE worker_id = ?")
            .bind(self.time_provider.now_millis())
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Worker {}", worker_id)));
        }
        Ok(())
    }

    async fn unregister(&self, worker_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE worker_id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use rota_core::port::time_provider::mocks::ManualClock;

    async fn setup_registry() -> SqliteWorkerRegistry {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteWorkerRegistry::new(pool, Arc::new(ManualClock::new(5_000)))
    }

    async fn setup_with_clock() -> (SqliteWorkerRegistry, Arc<ManualClock>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(ManualClock::new(5_000));
        let registry = SqliteWorkerRegistry::new(pool, clock.clone())
            .with_stale_after(Duration::from_secs(60));
        (registry, clock)
    }

    #[tokio::test]
    async fn test_dead_worker_stops_counting_after_window() {
        let (registry, clock) = setup_with_clock().await;
        registry.register("dead", &Subscription::Wildcard).await.unwrap();
        registry.set_working("dead", "mail_outbound").await.unwrap();

        clock.advance(60_000);
        assert_eq!(
            registry.list_active_workers().await.unwrap(),
            vec![WorkerObservation::working("dead", "mail_outbound")]
        );

        clock.advance(1);
        assert!(registry.list_active_workers().await.unwrap().is_empty());
        let records = registry.list_records().await.unwrap();
        assert!(registry.is_stale(&records[0]));
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_worker_alive() {
        let (registry, clock) = setup_with_clock().await;
        registry.register("w1", &Subscription::Wildcard).await.unwrap();
        registry.set_working("w1", "mail_outbound").await.unwrap();

        for _ in 0..5 {
            clock.advance(50_000);
            registry.heartbeat("w1").await.unwrap();
        }
        assert_eq!(
            registry.list_active_workers().await.unwrap(),
            vec![WorkerObservation::working("w1", "mail_outbound")]
        );

        let err = registry.heartbeat("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prune_stale_removes_only_dead_rows() {
        let (registry, clock) = setup_with_clock().await;
        registry.register("dead", &Subscription::Wildcard).await.unwrap();
        clock.advance(30_000);
        registry.register("alive", &Subscription::Wildcard).await.unwrap();
        clock.advance(31_000);

        assert_eq!(registry.prune_stale().await.unwrap(), 1);
        let records = registry.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].worker_id, "alive");
        assert_eq!(registry.prune_stale().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_and_observe() {
        let registry = setup_registry().await;
        registry.register("w1", &Subscription::Wildcard).await.unwrap();
        registry
            .register("w2", &Subscription::parse("mail,video"))
            .await
            .unwrap();
        registry.set_working("w2", "mail").await.unwrap();

        let workers = registry.list_active_workers().await.unwrap();
        assert_eq!(
            workers,
            vec![
                WorkerObservation::idle("w1"),
                WorkerObservation::working("w2", "mail"),
            ]
        );

        let records = registry.list_records().await.unwrap();
        assert_eq!(records[1].subscription, "mail,video");
        assert_eq!(records[1].updated_at, 5_000);
    }

    #[tokio::test]
    async fn test_set_idle_and_unregister() {
        let registry = setup_registry().await;
        registry.register("w1", &Subscription::Wildcard).await.unwrap();
        registry.set_working("w1", "mail").await.unwrap();
        registry.set_idle("w1").await.unwrap();
        assert_eq!(
            registry.list_active_workers().await.unwrap(),
            vec![WorkerObservation::idle("w1")]
        );

        registry.unregister("w1").await.unwrap();
        assert!(registry.list_active_workers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_working_unknown_worker() {
        let registry = setup_registry().await;
        let err = registry.set_working("ghost", "mail").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_register_resets_stale_state() {
        let registry = setup_registry().await;
        registry.register("w1", &Subscription::Wildcard).await.unwrap();
        registry.set_working("w1", "mail").await.unwrap();

        registry.register("w1", &Subscription::Wildcard).await.unwrap();
        assert_eq!(
            registry.list_active_workers().await.unwrap(),
            vec![WorkerObservation::idle("w1")]
        );
    }
}
