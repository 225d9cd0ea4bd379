// Job Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::queue::QueueName;
use super::worker::WorkerId;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Reserved,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Reserved => write!(f, "RESERVED"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RESERVED" => Ok(JobState::Reserved),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(DomainError::UnknownJobState(other.to_string())),
        }
    }
}

/// Job Payload (JSON serializable, opaque to the scheduler)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: QueueName,
    pub payload: JobPayload,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub reserved_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub reserved_by: Option<WorkerId>,
    pub error: Option<String>,
}

impl Job {
    /// Create a new queued job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `payload` - Job payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            payload,
            state: JobState::Queued,
            created_at,
            reserved_at: None,
            finished_at: None,
            reserved_by: None,
            error: None,
        }
    }

    /// Transition to Reserved with explicit timestamp
    pub fn reserve(&mut self, worker_id: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Reserved.to_string(),
            });
        }
        self.state = JobState::Reserved;
        self.reserved_at = Some(now_millis);
        self.reserved_by = Some(worker_id.into());
        Ok(())
    }

    /// Transition to Done with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        self.finish(JobState::Done, now_millis)
    }

    /// Transition to Failed with explicit timestamp
    pub fn fail(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        self.finish(JobState::Failed, now_millis)?;
        self.error = Some(reason.into());
        Ok(())
    }

    fn finish(&mut self, to: JobState, now_millis: i64) -> Result<()> {
        if self.state != JobState::Reserved {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.finished_at = Some(now_millis);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued() -> Job {
        Job::new(
            "job-1",
            1000,
            "mail_outbound",
            JobPayload::new(serde_json::json!({"to": "a@example.com"})),
        )
    }

    #[test]
    fn test_lifecycle() {
        let mut job = queued();
        assert_eq!(job.state, JobState::Queued);

        job.reserve("worker-1", 2000).unwrap();
        assert_eq!(job.state, JobState::Reserved);
        assert_eq!(job.reserved_by.as_deref(), Some("worker-1"));

        job.complete(3000).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.finished_at, Some(3000));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = queued();
        assert!(job.complete(2000).is_err());
        assert!(job.fail("boom", 2000).is_err());

        job.reserve("worker-1", 2000).unwrap();
        assert!(job.reserve("worker-2", 2500).is_err());

        job.fail("boom", 3000).unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.state.is_terminal());
    }

    #[test]
    fn test_state_round_trips_through_display() {
        for state in [
            JobState::Queued,
            JobState::Reserved,
            JobState::Done,
            JobState::Failed,
        ] {
            assert_eq!(state.to_string().parse::<JobState>().unwrap(), state);
        }
        assert!("RUNNING".parse::<JobState>().is_err());
    }
}
