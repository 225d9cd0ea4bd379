// Worker - host loop around a JobReserver

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{stop_channel, StopHandle, StopSignal};

use crate::application::reservation::JobReserver;
use crate::domain::{Job, Subscription, WorkerId};
use crate::error::Result;
use crate::port::{JobHandler, JobStore, WorkerRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// One worker: reserves, publishes what it is working on, runs the handler
pub struct Worker {
    worker_id: WorkerId,
    subscription: Subscription,
    reserver: Box<dyn JobReserver>,
    job_store: Arc<dyn JobStore>,
    registry: Arc<dyn WorkerRegistry>,
    handler: Arc<dyn JobHandler>,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        subscription: Subscription,
        reserver: Box<dyn JobReserver>,
        job_store: Arc<dyn JobStore>,
        registry: Arc<dyn WorkerRegistry>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            subscription,
            reserver,
            job_store,
            registry,
            handler,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            last_heartbeat: None,
        }
    }

    /// Override the heartbeat spacing (must be non-zero)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run until `stop` fires. Registers on entry and unregisters on exit.
    pub async fn run(mut self, mut stop: StopSignal) -> Result<()> {
        self.registry
            .register(&self.worker_id, &self.subscription)
            .await?;
        self.last_heartbeat = Some(Instant::now());
        info!(worker_id = %self.worker_id, queues = %self.subscription, "Worker started");

        while !stop.is_stopped() {
            if self.heartbeat_due() {
                self.heartbeat().await;
            }
            let pause = match self.work_one().await {
                Ok(true) => continue,
                Ok(false) => IDLE_SLEEP_DURATION,
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Worker error");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };
            if stop.sleep_or_stop(pause).await {
                break;
            }
        }

        info!(worker_id = %self.worker_id, "Worker stopping");
        self.registry.unregister(&self.worker_id).await
    }

    /// Reserve and process one job. Returns false when nothing was reserved.
    pub async fn work_one(&mut self) -> Result<bool> {
        let Some(job) = self.reserver.reserve_job().await? else {
            return Ok(false);
        };

        if let Err(e) = self.registry.set_working(&self.worker_id, &job.queue).await {
            // Unpublished work would stay RESERVED forever; give the job up
            error!(worker_id = %self.worker_id, job_id = %job.id, error = %e, "Cannot mark worker busy, failing job");
            let reason = format!("worker registry unavailable: {}", e);
            if let Err(fail_err) = self.job_store.fail(&job.id, &reason).await {
                error!(job_id = %job.id, error = %fail_err, "Failed to release job");
            }
            return Err(e);
        }

        let finished = self.process(&job).await;
        let idle = self.registry.set_idle(&self.worker_id).await;

        finished?;
        idle?;
        Ok(true)
    }

    fn heartbeat_due(&self) -> bool {
        self.last_heartbeat
            .map_or(true, |last| last.elapsed() >= self.heartbeat_interval)
    }

    /// Best effort: a missed heartbeat is retried on the next tick
    async fn heartbeat(&mut self) {
        match self.registry.heartbeat(&self.worker_id).await {
            Ok(()) => {
                self.last_heartbeat = Some(Instant::now());
                debug!(worker_id = %self.worker_id, "Heartbeat");
            }
            Err(e) => warn!(worker_id = %self.worker_id, error = %e, "Heartbeat failed"),
        }
    }

    async fn process(&mut self, job: &Job) -> Result<()> {
        info!(worker_id = %self.worker_id, job_id = %job.id, queue = %job.queue, "Processing job");

        // Run on its own task so a panicking handler only fails the job
        let handler = Arc::clone(&self.handler);
        let owned = job.clone();
        let mut task = tokio::spawn(async move { handler.handle(&owned).await });

        // Keep the registry row fresh while a long job runs
        let mut beat = tokio::time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        let outcome = loop {
            tokio::select! {
                outcome = &mut task => break outcome,
                _ = beat.tick() => self.heartbeat().await,
            }
        };

        match outcome {
            Ok(Ok(())) => {
                self.job_store.complete(&job.id).await?;
                info!(job_id = %job.id, "Job completed");
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "Job failed");
                self.job_store.fail(&job.id, &e.to_string()).await?;
            }
            Err(join_err) => {
                error!(job_id = %job.id, error = ?join_err, "Job handler panicked");
                self.job_store.fail(&job.id, "handler panicked").await?;
            }
        }
        Ok(())
    }
}
