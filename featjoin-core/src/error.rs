//! Error types for the featjoin engine

use std::io;
use thiserror::Error;

/// Result type for featjoin engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for featjoin engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A column is missing or has the wrong kind for the requested operation
    #[error("Schema error: {0}")]
    Schema(String),

    /// A declared join key is absent (or not a key column) on one side of a join
    #[error("Join key error: {0}")]
    JoinKey(String),

    /// Parameter tensor or operand dimensions do not line up
    #[error("Shape error: {0}")]
    Shape(String),

    /// A non-numeric column reached the feature matrix builder
    #[error("Type error: {0}")]
    Type(String),

    /// A workload failed while being measured
    #[error("Benchmark error in '{workload}': {source}")]
    Benchmark {
        /// Label of the workload that failed
        workload: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The matrix backend could not be constructed
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Wrap an error raised during measurement of `workload`
    pub fn benchmark(workload: &str, source: Error) -> Self {
        Error::Benchmark {
            workload: workload.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether this is a shape error, looking through benchmark wrapping
    pub fn is_shape_error(&self) -> bool {
        match self {
            Error::Shape(_) => true,
            Error::Benchmark { source, .. } => source.is_shape_error(),
            _ => false,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::Backend(err.to_string())
    }
}
