//! Error types for table sources and report writers

use thiserror::Error;

/// Error type for table sources and report writers
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] featjoin_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV format error
    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A field could not be read as its declared type
    #[error("Format error at row {row}, column '{column}': {message}")]
    Format {
        /// 1-based data row
        row: usize,
        /// Declared column name
        column: String,
        /// What went wrong
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for table sources and report writers
pub type Result<T> = std::result::Result<T, Error>;
