// Worker Observation - what the registry reports about other workers

use serde::{Deserialize, Serialize};

use super::queue::QueueName;

/// Worker identifier (UUID v4 in production)
pub type WorkerId = String;

/// One active worker as seen through the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerObservation {
    pub worker_id: WorkerId,
    /// Queue of the job in progress, `None` when idle
    pub queue: Option<QueueName>,
}

impl WorkerObservation {
    pub fn idle(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue: None,
        }
    }

    pub fn working(worker_id: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue: Some(queue.into()),
        }
    }
}
