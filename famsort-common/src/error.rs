//! Common error types for famsort

use thiserror::Error;

/// Common result type for famsort operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the famsort crates
///
/// Every variant here is an input or environment failure that aborts a run.
/// Recoverable per-respondent and per-batch failures are reported as
/// diagnostics instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file read/write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A column the run depends on is absent from the table
    #[error("Missing column: '{column}'")]
    MissingColumn { column: String },

    /// Input file extension is not one of the supported formats
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::MissingColumn`]
    pub fn missing_column(column: impl Into<String>) -> Self {
        Error::MissingColumn {
            column: column.into(),
        }
    }
}
