// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("Unknown job state: {0}")]
    UnknownJobState(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
