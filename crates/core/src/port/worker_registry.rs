// Worker Registry Port
//
// The scheduler only reads from the registry. The write half is used by the
// host worker loop to publish its own state.

use crate::domain::{Subscription, WorkerObservation};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Every active worker and the queue it is working on, if any
    async fn list_active_workers(&self) -> Result<Vec<WorkerObservation>>;

    /// Announce a worker (idle)
    async fn register(&self, worker_id: &str, subscription: &Subscription) -> Result<()>;

    /// Record that `worker_id` is processing a job from `queue`
    async fn set_working(&self, worker_id: &str, queue: &str) -> Result<()>;

    /// Record that `worker_id` has no job in progress
    async fn set_idle(&self, worker_id: &str) -> Result<()>;

    /// Refresh a worker's liveness without changing what it is working on.
    ///
    /// Workers that stop calling this (killed process, dropped task) age out
    /// of `list_active_workers` once the adapter's staleness window passes.
    async fn heartbeat(&self, worker_id: &str) -> Result<()>;

    /// Remove a worker from the active set
    async fn unregister(&self, worker_id: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::QueueName;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory registry keyed by worker id
    #[derive(Default)]
    pub struct InMemoryWorkerRegistry {
        workers: Mutex<BTreeMap<String, Option<QueueName>>>,
        list_calls: AtomicUsize,
        heartbeats: AtomicUsize,
        unavailable: AtomicBool,
        set_working_fails: AtomicBool,
    }

    impl InMemoryWorkerRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a registry with workers already busy on the given queues
        pub fn with_busy<I, S>(queues: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let registry = Self::new();
            {
                let mut workers = registry.workers.lock().unwrap();
                for (i, queue) in queues.into_iter().enumerate() {
                    workers.insert(format!("other-{}", i), Some(queue.into()));
                }
            }
            registry
        }

        /// Number of `list_active_workers` calls so far
        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        /// Make reads fail with a database error
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Make `set_working` fail with a database error
        pub fn set_working_fails(&self, fails: bool) {
            self.set_working_fails.store(fails, Ordering::SeqCst);
        }

        pub fn heartbeats(&self) -> usize {
            self.heartbeats.load(Ordering::SeqCst)
        }

        pub fn current_queue(&self, worker_id: &str) -> Option<QueueName> {
            self.workers
                .lock()
                .unwrap()
                .get(worker_id)
                .cloned()
                .flatten()
        }

        pub fn is_registered(&self, worker_id: &str) -> bool {
            self.workers.lock().unwrap().contains_key(worker_id)
        }
    }

    #[async_trait]
    impl WorkerRegistry for InMemoryWorkerRegistry {
        async fn list_active_workers(&self) -> Result<Vec<WorkerObservation>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::Database("registry unavailable".to_string()));
            }
            Ok(self
                .workers
                .lock()
                .unwrap()
                .iter()
                .map(|(id, queue)| WorkerObservation {
                    worker_id: id.clone(),
                    queue: queue.clone(),
                })
                .collect())
        }

        async fn register(&self, worker_id: &str, _subscription: &Subscription) -> Result<()> {
            self.workers
                .lock()
                .unwrap()
                .insert(worker_id.to_string(), None);
            Ok(())
        }

        async fn set_working(&self, worker_id: &str, queue: &str) -> Result<()> {
            if self.set_working_fails.load(Ordering::SeqCst) {
                return Err(AppError::Database("registry locked".to_string()));
            }
            self.workers
                .lock()
                .unwrap()
                .insert(worker_id.to_string(), Some(queue.to_string()));
            Ok(())
        }

        async fn set_idle(&self, worker_id: &str) -> Result<()> {
            self.workers
                .lock()
                .unwrap()
                .insert(worker_id.to_string(), None);
            Ok(())
        }

        async fn heartbeat(&self, _worker_id: &str) -> Result<()> {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn unregister(&self, worker_id: &str) -> Result<()> {
            self.workers.lock().unwrap().remove(worker_id);
            Ok(())
        }
    }
}
