// Queue Source Port
//
// Queues may be created or drained at any time, so callers re-list on every poll.

use crate::domain::{QueueName, Subscription};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Lists the queue names a worker may probe
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Current queue names, in probe order. Empty is valid.
    async fn list_queues(&self) -> Result<Vec<QueueName>>;
}

/// Narrows a store-wide queue listing to one worker's subscription
///
/// - `Wildcard`: every queue the store knows, sorted by name
/// - `Queues(list)`: exactly `list`, in the configured order
pub struct SubscribedQueues {
    all_queues: Arc<dyn QueueSource>,
    subscription: Subscription,
}

impl SubscribedQueues {
    pub fn new(all_queues: Arc<dyn QueueSource>, subscription: Subscription) -> Self {
        Self {
            all_queues,
            subscription,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

#[async_trait]
impl QueueSource for SubscribedQueues {
    async fn list_queues(&self) -> Result<Vec<QueueName>> {
        match &self.subscription {
            Subscription::Wildcard => {
                let mut queues = self.all_queues.list_queues().await?;
                queues.sort();
                queues.dedup();
                Ok(queues)
            }
            Subscription::Queues(queues) => Ok(queues.clone()),
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Queue source returning whatever list it was last given
    pub struct StaticQueueSource {
        queues: Mutex<Vec<QueueName>>,
    }

    impl StaticQueueSource {
        pub fn new<I, S>(queues: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                queues: Mutex::new(queues.into_iter().map(Into::into).collect()),
            }
        }

        pub fn set<I, S>(&self, queues: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            *self.queues.lock().unwrap() = queues.into_iter().map(Into::into).collect();
        }
    }

    #[async_trait]
    impl QueueSource for StaticQueueSource {
        async fn list_queues(&self) -> Result<Vec<QueueName>> {
            Ok(self.queues.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::StaticQueueSource;
    use super::*;

    #[tokio::test]
    async fn test_wildcard_lists_every_queue_sorted() {
        let all = Arc::new(StaticQueueSource::new(["video", "mail", "reports", "mail"]));
        let source = SubscribedQueues::new(all, Subscription::Wildcard);

        let queues = source.list_queues().await.unwrap();
        assert_eq!(queues, vec!["mail", "reports", "video"]);
    }

    #[tokio::test]
    async fn test_explicit_subscription_keeps_configured_order() {
        let all = Arc::new(StaticQueueSource::new(["a", "b", "c"]));
        let source = SubscribedQueues::new(
            all,
            Subscription::Queues(vec!["c".to_string(), "x".to_string()]),
        );

        let queues = source.list_queues().await.unwrap();
        assert_eq!(queues, vec!["c", "x"]);
    }
}
