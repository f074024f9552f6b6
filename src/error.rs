//! Error types for schedule generation.

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Error type for scheduler operations.
///
/// Infeasible inputs and unplaced lessons are not errors; they are reported
/// through `GenerationResult` and the status reporter.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Data integrity error: {0}")]
    Integrity(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl From<String> for SchedulerError {
    fn from(s: String) -> Self {
        SchedulerError::Internal(s)
    }
}

impl From<&str> for SchedulerError {
    fn from(s: &str) -> Self {
        SchedulerError::Internal(s.to_string())
    }
}
