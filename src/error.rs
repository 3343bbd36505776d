//! Error types for oracle calls and batch analysis.

use thiserror::Error;

/// Failure of a single oracle call.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Credentials or settings are missing; nothing was sent.
    #[error("Oracle is not configured: {0}")]
    Configuration(String),

    /// The oracle could not be reached or the request did not complete.
    #[error("Oracle request failed: {0}")]
    Transport(String),

    /// The oracle answered with a non-success status.
    #[error("Oracle API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The oracle answered, but not with a well-formed analysis.
    #[error("Invalid oracle response: {reason}")]
    Validation { reason: String, raw: String },
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Transport(err.to_string())
    }
}

/// Aggregate failure of a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No images submitted")]
    Empty,

    /// Raised before any image is dispatched.
    #[error("Analysis is not available: {0}")]
    Configuration(String),

    /// One or more images failed; `detail` carries the first failure.
    #[error("Failed to analyze images ({failed} of {total} failed): {detail}")]
    Failed {
        failed: usize,
        total: usize,
        detail: String,
    },

    #[error("Batch timed out after {0}s")]
    TimedOut(u64),
}
