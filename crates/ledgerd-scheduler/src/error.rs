use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cron expression could not be parsed.
    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// No job with the given name exists in the store.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },

    /// A run log was closed twice or never opened.
    #[error("Run log {id} is not open")]
    RunNotOpen { id: i64 },

    /// The clock could not arm a trigger (released, or no runtime available).
    #[error("Clock error: {0}")]
    Clock(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
