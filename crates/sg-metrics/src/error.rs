//! Error types for metrics and trace output.

use thiserror::Error;

/// Errors raised while writing or reading run outputs.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed trace row: {0}")]
    MalformedRow(String),
}

/// Alias for `Result<T, MetricsError>`.
pub type MetricsResult<T> = Result<T, MetricsError>;
