// SQLite QueueSource Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use rota_core::domain::QueueName;
use rota_core::error::Result;
use rota_core::port::QueueSource;
use sqlx::SqlitePool;

/// Every queue ever written to, ordered by name
pub struct SqliteQueueSource {
    pool: SqlitePool,
}

impl SqliteQueueSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Forget a queue that no longer holds any jobs.
    ///
    /// Returns false when the queue is unknown or still has jobs.
    pub async fn remove_queue(&self, name: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM queues
            WHERE name = ?
              AND NOT EXISTS (SELECT 1 FROM jobs WHERE queue = queues.name)
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QueueSource for SqliteQueueSource {
    async fn list_queues(&self) -> Result<Vec<QueueName>> {
        sqlx::query_scalar("SELECT name FROM queues ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobStore};
    use rota_core::port::id_provider::UuidProvider;
    use rota_core::port::time_provider::SystemTimeProvider;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lists_queues_sorted() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let source = SqliteQueueSource::new(pool.clone());
        assert!(source.list_queues().await.unwrap().is_empty());

        let store = SqliteJobStore::new(pool, Arc::new(SystemTimeProvider), Arc::new(UuidProvider));
        store.enqueue("video", json!({})).await.unwrap();
        store.enqueue("mail", json!({})).await.unwrap();
        store.enqueue("video", json!({})).await.unwrap();

        assert_eq!(source.list_queues().await.unwrap(), vec!["mail", "video"]);
    }

    #[tokio::test]
    async fn test_remove_queue_only_when_empty() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let source = SqliteQueueSource::new(pool.clone());
        let store = SqliteJobStore::new(pool.clone(), Arc::new(SystemTimeProvider), Arc::new(UuidProvider));
        store.enqueue("mail", json!({})).await.unwrap();

        assert!(!source.remove_queue("mail").await.unwrap());

        sqlx::query("INSERT INTO queues (name, created_at) VALUES ('empty', 0)")
            .execute(&pool)
            .await
            .unwrap();
        assert!(source.remove_queue("empty").await.unwrap());
        assert_eq!(source.list_queues().await.unwrap(), vec!["mail"]);
    }
}
