//! Error types for scheduler construction and configuration.
//!
//! Contention between resources is never an error; it is resolved by the
//! admission policy and reported through [`crate::core::Admission`].

use thiserror::Error;

/// Errors produced while building or configuring schedulers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration values are out of range or unparsable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A named scheduler was requested that the registry does not hold.
    #[error("unknown scheduler: {0}")]
    UnknownScheduler(String),
    /// Collaborator-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
