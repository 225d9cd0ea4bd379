// Rota Core - Round-robin reservation logic & Ports
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::SchedulerConfig;
pub use error::{AppError, Result};
