// Busy-Queue Observer - which queues other workers are working on right now

use crate::domain::{QueueName, WorkerObservation};
use crate::error::Result;
use crate::port::WorkerRegistry;
use std::sync::Arc;
use tracing::debug;

/// Multiset of in-progress queue names, one entry per working worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusyQueues {
    queues: Vec<QueueName>,
}

impl BusyQueues {
    pub fn from_observations(observations: &[WorkerObservation]) -> Self {
        observations
            .iter()
            .filter_map(|worker| worker.queue.clone())
            .collect()
    }

    /// Number of workers currently on `queue`
    pub fn depth(&self, queue: &str) -> usize {
        self.queues.iter().filter(|q| q.as_str() == queue).count()
    }

    pub fn contains(&self, queue: &str) -> bool {
        self.queues.iter().any(|q| q == queue)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// `candidates` minus every busy queue, keeping candidate order
    pub fn exclude_from(&self, candidates: &[QueueName]) -> Vec<QueueName> {
        candidates
            .iter()
            .filter(|candidate| !self.contains(candidate))
            .cloned()
            .collect()
    }
}

impl FromIterator<QueueName> for BusyQueues {
    fn from_iter<I: IntoIterator<Item = QueueName>>(iter: I) -> Self {
        Self {
            queues: iter.into_iter().collect(),
        }
    }
}

/// Reads the worker registry and derives busy queues from it
#[derive(Clone)]
pub struct BusyQueueObserver {
    registry: Arc<dyn WorkerRegistry>,
}

impl BusyQueueObserver {
    pub fn new(registry: Arc<dyn WorkerRegistry>) -> Self {
        Self { registry }
    }

    pub async fn busy_queues(&self) -> Result<BusyQueues> {
        let workers = self.registry.list_active_workers().await?;
        Ok(BusyQueues::from_observations(&workers))
    }

    pub async fn queue_depth(&self, queue: &str) -> Result<usize> {
        Ok(self.busy_queues().await?.depth(queue))
    }

    /// Drop candidates some worker is already busy on
    pub async fn filter_busy(&self, candidates: &[QueueName]) -> Result<Vec<QueueName>> {
        let busy = self.busy_queues().await?;
        let remaining = busy.exclude_from(candidates);
        debug!(
            candidates = candidates.len(),
            remaining = remaining.len(),
            busy = busy.len(),
            "Filtered busy queues"
        );
        Ok(remaining)
    }
}
