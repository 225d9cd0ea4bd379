// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reservation error on queue {queue}: {source}")]
    Reservation {
        queue: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Job handler error: {0}")]
    Handler(String),
}

impl AppError {
    /// Wrap an error raised while reserving from `queue`
    pub fn reservation(queue: impl Into<String>, source: AppError) -> Self {
        AppError::Reservation {
            queue: queue.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
