//! Error handling for report generation.

use thiserror::Error;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while building or writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
