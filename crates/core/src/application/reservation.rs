//! Reservation strategies - pick the queue a worker reserves its next job from
//!
//! `RoundRobinReserver` per poll:
//! 1. list queues (never cached between polls)
//! 2. rotate them, advancing first if the slice expired
//! 3. optionally drop queues other workers are busy on
//! 4. for each candidate: skip if admission rejects it, otherwise try to
//!    reserve; return the first job found, advancing the cursor after every
//!    admitted queue that came back empty
//!
//! Any error aborts the scan: it is logged and returned, and no later
//! candidate is tried during that poll.

use crate::application::admission::AdmissionControl;
use crate::application::busy::BusyQueueObserver;
use crate::application::rotation::RotationState;
use crate::config::{SchedulerConfig, Strategy};
use crate::domain::{Job, QueueName, WorkerId};
use crate::error::{AppError, Result};
use crate::port::{JobStore, QueueSource, TimeProvider, WorkerRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Contract the host worker loop calls once per poll
#[async_trait]
pub trait JobReserver: Send + Sync {
    /// Reserve the next job, or `None` when nothing is eligible
    async fn reserve_job(&mut self) -> Result<Option<Job>>;
}

/// External collaborators shared by every scheduler in a process
#[derive(Clone)]
pub struct ReservationPorts {
    pub queue_source: Arc<dyn QueueSource>,
    pub job_store: Arc<dyn JobStore>,
    pub registry: Arc<dyn WorkerRegistry>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Build the reserver selected by `config.strategy`
pub fn build_reserver(
    worker_id: impl Into<WorkerId>,
    config: Arc<SchedulerConfig>,
    ports: ReservationPorts,
) -> Box<dyn JobReserver> {
    match config.strategy {
        Strategy::RoundRobin => Box::new(RoundRobinReserver::new(worker_id, config, ports)),
        Strategy::Ordered => Box::new(OrderedReserver::new(
            worker_id,
            ports.queue_source,
            ports.job_store,
        )),
    }
}

/// Time-sliced round robin with depth-based admission
pub struct RoundRobinReserver {
    worker_id: WorkerId,
    config: Arc<SchedulerConfig>,
    queue_source: Arc<dyn QueueSource>,
    job_store: Arc<dyn JobStore>,
    time_provider: Arc<dyn TimeProvider>,
    observer: BusyQueueObserver,
    admission: AdmissionControl,
    rotation: RotationState,
}

impl RoundRobinReserver {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        config: Arc<SchedulerConfig>,
        ports: ReservationPorts,
    ) -> Self {
        Self::with_rotation(worker_id, config, ports, RotationState::new())
    }

    /// Start from an existing rotation state (e.g. a non-zero cursor)
    pub fn with_rotation(
        worker_id: impl Into<WorkerId>,
        config: Arc<SchedulerConfig>,
        ports: ReservationPorts,
        rotation: RotationState,
    ) -> Self {
        let observer = BusyQueueObserver::new(ports.registry);
        let admission = AdmissionControl::new(Arc::clone(&config), observer.clone());
        Self {
            worker_id: worker_id.into(),
            config,
            queue_source: ports.queue_source,
            job_store: ports.job_store,
            time_provider: ports.time_provider,
            observer,
            admission,
            rotation,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn rotation(&self) -> &RotationState {
        &self.rotation
    }

    /// Probe order for the next poll without reserving anything
    pub async fn rotated_queues(&mut self) -> Result<Vec<QueueName>> {
        let snapshot = self.queue_source.list_queues().await?;
        let now = self.time_provider.now_millis();
        Ok(self.rotation.rotated_queues(&snapshot, now))
    }

    async fn scan(&mut self) -> Result<Option<Job>> {
        let snapshot = self.queue_source.list_queues().await?;
        if snapshot.is_empty() {
            debug!(worker_id = %self.worker_id, "No queues to check");
            return Ok(None);
        }

        let now = self.time_provider.now_millis();
        let mut candidates = self.rotation.rotated_queues(&snapshot, now);
        if self.config.busy_filter {
            candidates = self.observer.filter_busy(&candidates).await?;
        }

        for queue in candidates {
            debug!(worker_id = %self.worker_id, queue = %queue, "Checking queue");
            if !self.admission.may_probe(&queue).await? {
                continue;
            }

            let reserved = self
                .job_store
                .reserve(&queue, &self.worker_id)
                .await
                .map_err(|e| AppError::reservation(queue.as_str(), e))?;

            match reserved {
                Some(job) => {
                    debug!(worker_id = %self.worker_id, queue = %queue, job_id = %job.id, "Found job");
                    let now = self.time_provider.now_millis();
                    if self.rotation.record_reservation(
                        &queue,
                        now,
                        self.config.slice_length_millis(),
                    ) {
                        info!(
                            worker_id = %self.worker_id,
                            queue = %queue,
                            slice_deadline = ?self.rotation.slice_deadline(),
                            "Starting new slice"
                        );
                    }
                    return Ok(Some(job));
                }
                // Next search starts after the queue that came back empty
                None => self.rotation.advance(snapshot.len()),
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl JobReserver for RoundRobinReserver {
    async fn reserve_job(&mut self) -> Result<Option<Job>> {
        self.scan().await.map_err(|e| {
            error!(worker_id = %self.worker_id, error = %e, detail = ?e, "Error reserving job");
            e
        })
    }
}

/// Plain reservation: first non-empty queue in listed order
pub struct OrderedReserver {
    worker_id: WorkerId,
    queue_source: Arc<dyn QueueSource>,
    job_store: Arc<dyn JobStore>,
}

impl OrderedReserver {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        queue_source: Arc<dyn QueueSource>,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue_source,
            job_store,
        }
    }

    async fn scan(&self) -> Result<Option<Job>> {
        for queue in self.queue_source.list_queues().await? {
            debug!(worker_id = %self.worker_id, queue = %queue, "Checking queue");
            let reserved = self
                .job_store
                .reserve(&queue, &self.worker_id)
                .await
                .map_err(|e| AppError::reservation(queue.as_str(), e))?;
            if reserved.is_some() {
                return Ok(reserved);
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl JobReserver for OrderedReserver {
    async fn reserve_job(&mut self) -> Result<Option<Job>> {
        self.scan().await.map_err(|e| {
            error!(worker_id = %self.worker_id, error = %e, detail = ?e, "Error reserving job");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueDepths;
    use crate::domain::Subscription;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::queue_source::mocks::StaticQueueSource;
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::worker_registry::mocks::InMemoryWorkerRegistry;
    use serde_json::json;

    struct Harness {
        source: Arc<StaticQueueSource>,
        store: Arc<InMemoryJobStore>,
        registry: Arc<InMemoryWorkerRegistry>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new(queues: &[&str]) -> Self {
            Self {
                source: Arc::new(StaticQueueSource::new(queues.iter().copied())),
                store: Arc::new(InMemoryJobStore::new()),
                registry: Arc::new(InMemoryWorkerRegistry::new()),
                clock: Arc::new(ManualClock::new(1_000)),
            }
        }

        fn ports(&self) -> ReservationPorts {
            ReservationPorts {
                queue_source: self.source.clone(),
                job_store: self.store.clone(),
                registry: self.registry.clone(),
                time_provider: self.clock.clone(),
            }
        }

        fn reserver(&self, config: SchedulerConfig, rotation: RotationState) -> RoundRobinReserver {
            RoundRobinReserver::with_rotation("worker-1", Arc::new(config), self.ports(), rotation)
        }
    }

    /// Rotation whose slice will not expire during the test
    fn armed(offset: usize) -> RotationState {
        let mut rotation = RotationState::starting_at(offset);
        rotation.record_reservation("previous", 1_000, 3_600_000);
        rotation
    }

    #[tokio::test]
    async fn test_scans_in_order_until_job_found() {
        let h = Harness::new(&["a", "b", "c"]);
        let job_id = h.store.push("c", json!({"n": 1}));
        let mut reserver = h.reserver(SchedulerConfig::default(), armed(0));

        let job = reserver.reserve_job().await.unwrap().unwrap();

        assert_eq!(job.id, job_id);
        assert_eq!(h.store.reserve_calls(), vec!["a", "b", "c"]);
        assert_eq!(reserver.rotation().offset(), 2);
        assert_eq!(reserver.rotation().current_queue(), Some("c"));
        assert_eq!(reserver.rotation().slice_deadline(), Some(1_000 + 60_000));
    }

    #[tokio::test]
    async fn test_empty_scan_advances_once_per_admitted_queue() {
        let h = Harness::new(&["x", "y"]);
        let mut reserver = h.reserver(SchedulerConfig::default(), armed(1));

        assert!(reserver.reserve_job().await.unwrap().is_none());
        assert_eq!(h.store.reserve_calls(), vec!["y", "x"]);
        assert_eq!(reserver.rotation().offset(), 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot_returns_none_without_touching_state() {
        let h = Harness::new(&[]);
        let mut reserver = h.reserver(SchedulerConfig::default(), RotationState::new());

        assert!(reserver.reserve_job().await.unwrap().is_none());
        assert_eq!(reserver.rotation(), &RotationState::new());
    }

    #[tokio::test]
    async fn test_rejected_queue_is_skipped_without_advancing() {
        let h = Harness::new(&["mail_outbound", "video"]);
        h.registry.set_working("other", "mail_outbound").await.unwrap();
        let config = SchedulerConfig {
            queue_depths: QueueDepths::new().with("mail", 1),
            subscription: Subscription::Queues(vec!["mail_outbound".into(), "video".into()]),
            ..SchedulerConfig::default()
        };
        h.store.push("mail_outbound", json!({}));
        let mut reserver = h.reserver(config, armed(0));

        assert!(reserver.reserve_job().await.unwrap().is_none());
        assert_eq!(h.store.reserve_calls(), vec!["video"]);
        assert_eq!(reserver.rotation().offset(), 1);
        assert_eq!(h.store.queued_count("mail_outbound"), 1);
    }

    #[tokio::test]
    async fn test_same_queue_does_not_extend_slice() {
        let h = Harness::new(&["a", "b"]);
        h.store.push("a", json!({}));
        h.store.push("a", json!({}));
        let mut reserver = h.reserver(SchedulerConfig::default(), RotationState::new());

        reserver.reserve_job().await.unwrap().unwrap();
        let deadline = reserver.rotation().slice_deadline();
        assert_eq!(deadline, Some(61_000));

        h.clock.advance(30_000);
        reserver.reserve_job().await.unwrap().unwrap();
        assert_eq!(reserver.rotation().slice_deadline(), deadline);
    }

    #[tokio::test]
    async fn test_slice_expiry_moves_to_next_queue() {
        let h = Harness::new(&["a", "b"]);
        for _ in 0..3 {
            h.store.push("a", json!({}));
        }
        h.store.push("b", json!({}));
        let mut reserver = h.reserver(SchedulerConfig::default(), RotationState::new());

        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "a");
        h.clock.advance(60_001);
        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "b");
        assert_eq!(reserver.rotation().current_queue(), Some("b"));
    }

    #[tokio::test]
    async fn test_busy_filter_drops_busy_queues_when_enabled() {
        let h = Harness::new(&["a", "b"]);
        h.registry.set_working("other", "a").await.unwrap();
        h.store.push("a", json!({}));
        h.store.push("b", json!({}));

        let config = SchedulerConfig {
            busy_filter: true,
            ..SchedulerConfig::default()
        };
        let mut reserver = h.reserver(config, armed(0));
        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "b");
        assert_eq!(h.store.reserve_calls(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_busy_filter_off_by_default() {
        let h = Harness::new(&["a", "b"]);
        h.registry.set_working("other", "a").await.unwrap();
        h.store.push("a", json!({}));

        let mut reserver = h.reserver(SchedulerConfig::default(), armed(0));
        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "a");
    }

    #[tokio::test]
    async fn test_reservation_error_aborts_scan() {
        let h = Harness::new(&["a", "b", "c"]);
        h.store.fail_on("b");
        h.store.push("c", json!({}));
        let mut reserver = h.reserver(SchedulerConfig::default(), armed(0));

        let err = reserver.reserve_job().await.unwrap_err();
        assert!(matches!(err, AppError::Reservation { ref queue, .. } if queue == "b"));
        assert_eq!(h.store.reserve_calls(), vec!["a", "b"]);
        assert_eq!(h.store.queued_count("c"), 1);
        assert_eq!(reserver.rotation().offset(), 1);
    }

    #[tokio::test]
    async fn test_queue_list_is_refetched_every_poll() {
        let h = Harness::new(&["a"]);
        let mut reserver = h.reserver(SchedulerConfig::default(), armed(0));
        assert!(reserver.reserve_job().await.unwrap().is_none());

        h.source.set(["a", "b"]);
        h.store.push("b", json!({}));
        h.store.clear_calls();
        assert!(reserver.reserve_job().await.unwrap().is_some());
        assert_eq!(h.store.reserve_calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_ordered_reserver_ignores_rotation_and_limits() {
        let h = Harness::new(&["a", "b", "c"]);
        h.store.push("b", json!({}));
        h.store.push("c", json!({}));
        let config = Arc::new(SchedulerConfig {
            strategy: Strategy::Ordered,
            depth_override: Some(1),
            ..SchedulerConfig::default()
        });
        h.registry.set_working("other", "b").await.unwrap();

        let mut reserver = build_reserver("worker-1", config, h.ports());
        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "b");
        assert_eq!(reserver.reserve_job().await.unwrap().unwrap().queue, "c");
        assert!(reserver.reserve_job().await.unwrap().is_none());
    }
}
