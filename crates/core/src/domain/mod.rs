// Domain Layer - Pure entities and value types

pub mod error;
pub mod job;
pub mod queue;
pub mod worker;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobPayload, JobState};
pub use queue::{validate_queue_name, QueueName, Subscription, WILDCARD};
pub use worker::{WorkerId, WorkerObservation};
