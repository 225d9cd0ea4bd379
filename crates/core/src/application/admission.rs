//! Admission Control - gate each candidate queue before reserving from it
//!
//! 1. Wildcard workers are always admitted.
//! 2. The max depth comes from the global override if set, otherwise from
//!    the longest configured prefix matching `<prefix>_...`, otherwise 0.
//! 3. A max of 0 means unlimited; the registry is not consulted.
//! 4. Otherwise the queue is admitted while fewer than `max` workers are on it.
//!
//! Depth is read from an eventually consistent registry. Two workers can pass
//! the gate at the same moment and briefly exceed the cap.

use crate::application::busy::{BusyQueueObserver, BusyQueues};
use crate::config::SchedulerConfig;
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Why a queue was or was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Wildcard worker, limits do not apply
    Bypass,
    /// No cap configured for this queue
    Unlimited,
    /// Cap configured and not yet reached
    Within { depth: usize, max: u32 },
    /// Cap reached or exceeded
    Full { depth: usize, max: u32 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Full { .. })
    }
}

pub struct AdmissionControl {
    config: Arc<SchedulerConfig>,
    observer: BusyQueueObserver,
}

impl AdmissionControl {
    pub fn new(config: Arc<SchedulerConfig>, observer: BusyQueueObserver) -> Self {
        Self { config, observer }
    }

    /// Decide against a busy snapshot the caller already holds
    pub fn admits(&self, queue: &str, busy: &BusyQueues) -> Admission {
        match self.limit_for(queue) {
            None if self.config.is_wildcard() => Admission::Bypass,
            None => Admission::Unlimited,
            Some(max) => Self::compare(busy.depth(queue), max),
        }
    }

    /// Decide for `queue`, reading the registry only when a cap applies
    pub async fn check(&self, queue: &str) -> Result<Admission> {
        let Some(max) = self.limit_for(queue) else {
            return Ok(if self.config.is_wildcard() {
                Admission::Bypass
            } else {
                Admission::Unlimited
            });
        };

        let depth = self.observer.queue_depth(queue).await?;
        let admission = Self::compare(depth, max);
        debug!(queue = %queue, depth, max, admitted = admission.is_admitted(), "Queue depth");
        Ok(admission)
    }

    pub async fn may_probe(&self, queue: &str) -> Result<bool> {
        Ok(self.check(queue).await?.is_admitted())
    }

    /// Effective cap, `None` when the queue is not limited for this worker
    fn limit_for(&self, queue: &str) -> Option<u32> {
        if self.config.is_wildcard() {
            return None;
        }
        match self.config.max_depth_for(queue) {
            0 => None,
            max => Some(max),
        }
    }

    fn compare(depth: usize, max: u32) -> Admission {
        if depth < max as usize {
            Admission::Within { depth, max }
        } else {
            Admission::Full { depth, max }
        }
    }
}
