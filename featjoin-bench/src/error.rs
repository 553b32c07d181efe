//! Error types for the benchmark driver

use std::path::PathBuf;

use thiserror::Error;

/// Result type for benchmark driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or running a sweep
#[derive(Error, Debug)]
pub enum Error {
    /// Engine error
    #[error(transparent)]
    Core(#[from] featjoin_core::Error),

    /// Table source or report writer error
    #[error(transparent)]
    Readers(#[from] featjoin_readers::Error),

    /// I/O error outside the readers
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration file '{path}': {source}")]
    ConfigParse {
        /// File that failed
        path: PathBuf,
        /// Parser error
        source: serde_json::Error,
    },

    /// Configuration values are inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
