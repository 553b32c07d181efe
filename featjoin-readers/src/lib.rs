//! Table sources and report writers for featjoin
//!
//! Tables come from headerless delimited files such as TPC-H `.tbl` dumps,
//! with each declared column mapped positionally. Sweep results go out as a
//! `Method,Algorithm,Sparsity,Runtime` report.

#![warn(missing_docs)]

mod error;

#[cfg(feature = "csv")]
pub mod csv;

#[cfg(feature = "csv")]
pub use crate::csv::{load_table, CsvReportWriter, TableReader, TableReaderOptions};
pub use error::{Error, Result};

// Re-export core types
pub use featjoin_core::{ColumnKind, DataType, Field, Table};
