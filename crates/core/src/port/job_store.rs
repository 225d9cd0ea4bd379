// Job Store Port (Interface)

use crate::domain::{Job, JobId, QueueName};
use crate::error::Result;
use async_trait::async_trait;

/// Storage holding queued jobs and the atomic reservation primitive
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically take the oldest queued job from `queue` for `worker_id`.
    ///
    /// Returns `Ok(None)` when the queue is empty. A job is never handed to
    /// two callers.
    async fn reserve(&self, queue: &str, worker_id: &str) -> Result<Option<Job>>;

    /// Mark a reserved job as done
    async fn complete(&self, job_id: &JobId) -> Result<()>;

    /// Mark a reserved job as failed
    async fn fail(&self, job_id: &JobId, reason: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{JobPayload, JobState};
    use crate::error::AppError;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        queues: HashMap<QueueName, VecDeque<Job>>,
        finished: HashMap<JobId, JobState>,
        reserve_calls: Vec<QueueName>,
        failing_queues: HashSet<QueueName>,
        next_id: u64,
    }

    /// In-memory job store that records every reservation attempt
    #[derive(Default)]
    pub struct InMemoryJobStore {
        inner: Mutex<Inner>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Push a job onto `queue`, returning its id
        pub fn push(&self, queue: &str, payload: serde_json::Value) -> JobId {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = format!("job-{}", inner.next_id);
            let job = Job::new(
                id.clone(),
                inner.next_id as i64,
                queue,
                JobPayload::new(payload),
            );
            inner
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(job);
            id
        }

        /// Make every `reserve` on `queue` return a database error
        pub fn fail_on(&self, queue: &str) {
            self.inner
                .lock()
                .unwrap()
                .failing_queues
                .insert(queue.to_string());
        }

        /// Queues passed to `reserve`, in call order
        pub fn reserve_calls(&self) -> Vec<QueueName> {
            self.inner.lock().unwrap().reserve_calls.clone()
        }

        pub fn clear_calls(&self) {
            self.inner.lock().unwrap().reserve_calls.clear();
        }

        pub fn finished_state(&self, job_id: &str) -> Option<JobState> {
            self.inner.lock().unwrap().finished.get(job_id).copied()
        }

        pub fn queued_count(&self, queue: &str) -> usize {
            self.inner
                .lock()
                .unwrap()
                .queues
                .get(queue)
                .map_or(0, VecDeque::len)
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn reserve(&self, queue: &str, worker_id: &str) -> Result<Option<Job>> {
            let mut inner = self.inner.lock().unwrap();
            inner.reserve_calls.push(queue.to_string());

            if inner.failing_queues.contains(queue) {
                return Err(AppError::Database(format!("queue {} unavailable", queue)));
            }

            let Some(mut job) = inner.queues.get_mut(queue).and_then(VecDeque::pop_front) else {
                return Ok(None);
            };
            job.reserve(worker_id, job.created_at)?;
            Ok(Some(job))
        }

        async fn complete(&self, job_id: &JobId) -> Result<()> {
            self.inner
                .lock()
                .unwrap()
                .finished
                .insert(job_id.clone(), JobState::Done);
            Ok(())
        }

        async fn fail(&self, job_id: &JobId, _reason: &str) -> Result<()> {
            self.inner
                .lock()
                .unwrap()
                .finished
                .insert(job_id.clone(), JobState::Failed);
            Ok(())
        }
    }
}
