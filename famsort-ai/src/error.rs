//! Error types for famsort-ai
//!
//! Two layers:
//! - [`OracleError`]: one failed call to the external language-model service.
//!   Always recovered locally (sentinel summary, voided batch).
//! - [`PipelineError`]: a failed run. Input errors abort before any output
//!   is written; anything unexpected is reported as a processing failure.

use serde_json::json;
use thiserror::Error;

/// External service call error
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Empty response")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl OracleError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Network(_) => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Run-level error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing column, unsupported format, unreadable file, bad config
    #[error("Input error: {0}")]
    Input(#[from] famsort_common::Error),

    /// Anything else, caught at the run boundary
    #[error("Processing failed: {0}")]
    Processing(#[from] anyhow::Error),
}

impl PipelineError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Input(_) => "INPUT_ERROR",
            PipelineError::Processing(_) => "PROCESSING_FAILED",
        }
    }

    /// Structured error body for callers
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;
