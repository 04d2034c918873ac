//! Error types for table readers and output writers

use std::path::PathBuf;
use thiserror::Error;

/// Format errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Core(#[from] geolink_core::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed record at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Invalid WKT: {0}")]
    Wkt(String),

    #[error("{table} table has no {field} column (looked for {candidates})")]
    MissingColumn {
        table: &'static str,
        field: &'static str,
        candidates: String,
    },

    #[error("{table} line {line}: {message}")]
    Schema {
        table: &'static str,
        line: usize,
        message: String,
    },

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for format operations
pub type Result<T> = std::result::Result<T, Error>;
