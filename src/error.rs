//! Error types for the index report aggregator

use thiserror::Error;

/// Errors that can occur while loading, aggregating, or writing an index report
#[derive(Debug, Error)]
pub enum ReportError {
    /// File system error (open, create, read_dir)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input or a failed CSV write
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// One or more required columns are absent from the header row
    #[error("missing required column(s) {columns:?}; available columns: {available:?}")]
    MissingColumns {
        columns: Vec<String>,
        available: Vec<String>,
    },
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, ReportError>;
