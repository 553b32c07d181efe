//! Delimited report writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::WriterBuilder;
use featjoin_core::{ReportRow, ReportSink};
use tracing::info;

use crate::error::{Error, Result};

/// Header row of every report
pub const REPORT_HEADER: [&str; 4] = ["Method", "Algorithm", "Sparsity", "Runtime"];

/// Writes report rows as `Method,Algorithm,Sparsity,Runtime`
pub struct CsvReportWriter<W: Write> {
    /// Inner CSV writer
    writer: csv::Writer<W>,

    /// Rows written so far
    rows_written: usize,
}

impl<W: Write> CsvReportWriter<W> {
    /// Create a writer and emit the header row
    pub fn new(writer: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().delimiter(b',').from_writer(writer);
        writer.write_record(REPORT_HEADER)?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Number of data rows written
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

impl CsvReportWriter<BufWriter<File>> {
    /// Create (or truncate) a report file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "writing report");
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ReportSink for CsvReportWriter<W> {
    type Error = Error;

    fn consume(&mut self, rows: &[ReportRow]) -> Result<()> {
        for row in rows {
            let parameter = row.parameter.map(|p| p.to_string()).unwrap_or_default();
            self.writer.write_record([
                row.method.as_str(),
                row.algorithm.as_str(),
                parameter.as_str(),
                row.value.to_string().as_str(),
            ])?;
            self.rows_written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_layout() {
        let mut writer = CsvReportWriter::new(Vec::new()).unwrap();
        writer
            .consume(&[
                ReportRow {
                    method: "Native (1 Core)".into(),
                    algorithm: "SUM(ABC)".into(),
                    parameter: Some(0.001),
                    value: 1.5,
                },
                ReportRow {
                    method: "Native (1 Core)".into(),
                    algorithm: "Covariance (SJ)".into(),
                    parameter: None,
                    value: 0.25,
                },
            ])
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.rows_written(), 2);

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "Method,Algorithm,Sparsity,Runtime\n\
             Native (1 Core),SUM(ABC),0.001,1.5\n\
             Native (1 Core),Covariance (SJ),,0.25\n"
        );
    }
}
