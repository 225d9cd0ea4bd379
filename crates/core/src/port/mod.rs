// Port Layer - Interfaces for external collaborators

pub mod id_provider;
pub mod job_handler;
pub mod job_store;
pub mod queue_source;
pub mod time_provider; // For deterministic testing
pub mod worker_registry;

// Re-exports
pub use id_provider::IdProvider;
pub use job_handler::JobHandler;
pub use job_store::JobStore;
pub use queue_source::{QueueSource, SubscribedQueues};
pub use time_provider::TimeProvider;
pub use worker_registry::WorkerRegistry;
