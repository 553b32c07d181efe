//! Delimited text: table reader and report writer

mod reader;
mod writer;

pub use reader::{load_table, TableReader, TableReaderOptions};
pub use writer::{CsvReportWriter, REPORT_HEADER};
