//! Error handling for the batch driver.

use thiserror::Error;

use batchsim_core::CoreError;
use batchsim_report::ReportError;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while loading a scenario or driving simulations.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("simulation error: {0}")]
    Core(#[from] CoreError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed scenario: {0}")]
    Scenario(String),

    #[error("simulation worker panicked: {0}")]
    Worker(String),
}
