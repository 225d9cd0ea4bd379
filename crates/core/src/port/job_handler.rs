// Job Handler Port
// Runs a reserved job. Execution itself lives outside the scheduler.

use crate::domain::Job;
use crate::error::Result;
use async_trait::async_trait;

/// Job Handler trait
///
/// Implementations decide what a job payload means. An `Err` marks the job
/// failed; the worker loop keeps running either way.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

/// Handler that only logs the job (used by the daemon when no executor is wired)
pub struct LoggingHandler;

#[async_trait]
impl JobHandler for LoggingHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        tracing::info!(
            job_id = %job.id,
            queue = %job.queue,
            payload = %job.payload.as_value(),
            "Handled job"
        );
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobId;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Handler that records job ids and optionally fails
    #[derive(Default)]
    pub struct RecordingHandler {
        handled: Mutex<Vec<JobId>>,
        fail_with: Option<String>,
    }

    impl RecordingHandler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                handled: Mutex::new(Vec::new()),
                fail_with: Some(message.into()),
            }
        }

        pub fn handled(&self) -> Vec<JobId> {
            self.handled.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: &Job) -> Result<()> {
            self.handled.lock().unwrap().push(job.id.clone());
            match &self.fail_with {
                Some(msg) => Err(AppError::Handler(msg.clone())),
                None => Ok(()),
            }
        }
    }
}
