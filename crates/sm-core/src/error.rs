//! Error types for sm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building the combined customer file
#[derive(Debug, Error)]
pub enum Error {
    /// An input extract does not exist or cannot be opened
    #[error("source file '{path}' not found or not readable")]
    SourceNotFound { path: PathBuf },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A column required by a stage is absent
    #[error("column '{column}' not found in {table}")]
    MissingColumn { column: String, table: String },

    /// The encryption capability rejected a value
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// One or more mapped records broke the output contract
    #[error("{count} invalid record(s) found, export suppressed")]
    InvalidRecordFound { count: usize },

    /// The destination file could not be written
    #[error("output file '{path}' is unavailable: {source}")]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to render CSV output
    #[error("failed to render CSV: {0}")]
    CsvWrite(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SourceNotFound { .. } => 3,
            Error::InvalidRecordFound { .. } => 4,
            Error::OutputUnavailable { .. } => 5,
            _ => 1,
        }
    }
}
