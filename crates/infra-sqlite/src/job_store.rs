// SQLite JobStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use rota_core::domain::{validate_queue_name, DomainError, Job, JobId, JobPayload, JobState};
use rota_core::error::{AppError, Result};
use rota_core::port::{IdProvider, JobStore, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Per-queue job counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queue: String,
    pub queued: i64,
    pub reserved: i64,
    pub done: i64,
    pub failed: i64,
}

pub struct SqliteJobStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl SqliteJobStore {
    pub fn new(
        pool: SqlitePool,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            pool,
            time_provider,
            id_provider,
        }
    }

    /// Queue a new job, creating the queue on first use
    pub async fn enqueue(&self, queue: &str, payload: serde_json::Value) -> Result<JobId> {
        validate_queue_name(queue)?;

        let now = self.time_provider.now_millis();
        let job = Job::new(
            self.id_provider.generate_id(),
            now,
            queue,
            JobPayload::new(payload),
        );

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("INSERT OR IGNORE INTO queues (name, created_at) VALUES (?, ?)")
            .bind(&job.queue)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, payload, state, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.payload.as_value().to_string())
        .bind(job.state.to_string())
        .bind(job.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(job_id = %job.id, queue = %job.queue, "Job enqueued");
        Ok(job.id)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    pub async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
            .bind(queue)
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Job counts for every known queue, ordered by queue name
    pub async fn queue_stats(&self) -> Result<Vec<QueueStats>> {
        let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT q.name,
                   COALESCE(SUM(j.state = 'QUEUED'), 0),
                   COALESCE(SUM(j.state = 'RESERVED'), 0),
                   COALESCE(SUM(j.state = 'DONE'), 0),
                   COALESCE(SUM(j.state = 'FAILED'), 0)
            FROM queues q
            LEFT JOIN jobs j ON j.queue = q.name
            GROUP BY q.name
            ORDER BY q.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(queue, queued, reserved, done, failed)| QueueStats {
                queue,
                queued,
                reserved,
                done,
                failed,
            })
            .collect())
    }

    /// Move a RESERVED job to a terminal state
    async fn finish(&self, job_id: &JobId, to: JobState, error: Option<&str>) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, finished_at = ?, error = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(to.to_string())
        .bind(now)
        .bind(error)
        .bind(job_id)
        .bind(JobState::Reserved.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_by_id(job_id).await? {
            None => Err(AppError::NotFound(format!("Job {}", job_id))),
            Some(job) => Err(DomainError::InvalidStateTransition {
                from: job.state.to_string(),
                to: to.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn reserve(&self, queue: &str, worker_id: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // Single statement: the row flips to RESERVED before any other
        // connection can select it
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, reserved_at = ?, reserved_by = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ?
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Reserved.to_string())
        .bind(now)
        .bind(worker_id)
        .bind(queue)
        .bind(JobState::Queued.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn complete(&self, job_id: &JobId) -> Result<()> {
        self.finish(job_id, JobState::Done, None).await
    }

    async fn fail(&self, job_id: &JobId, reason: &str) -> Result<()> {
        self.finish(job_id, JobState::Failed, Some(reason)).await
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    payload: String,
    state: String,
    created_at: i64,
    reserved_at: Option<i64>,
    finished_at: Option<i64>,
    reserved_by: Option<String>,
    error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state: JobState = self.state.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            payload: JobPayload::new(payload),
            state,
            created_at: self.created_at,
            reserved_at: self.reserved_at,
            finished_at: self.finished_at,
            reserved_by: self.reserved_by,
            error: self.error,
        })
    }
}
