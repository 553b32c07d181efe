//! Report sink trait and an in-memory implementation

use std::convert::Infallible;

use serde::Serialize;

use crate::sweep::TimingResult;

/// One report row: `(method, algorithm, parameter, value)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Backend and parallelism label
    pub method: String,

    /// Workload label
    pub algorithm: String,

    /// Sweep parameter, such as the sparsity level
    pub parameter: Option<f64>,

    /// Mean runtime in seconds
    pub value: f64,
}

impl From<&TimingResult> for ReportRow {
    fn from(result: &TimingResult) -> Self {
        Self {
            method: result.method.clone(),
            algorithm: result.algorithm.clone(),
            parameter: result.parameter,
            value: result.mean_seconds,
        }
    }
}

/// A sink that persists report rows in order
pub trait ReportSink {
    /// The error type that can be produced by this sink
    type Error;

    /// Consume rows in order
    fn consume(&mut self, rows: &[ReportRow]) -> Result<(), Self::Error>;

    /// Flush any buffered rows and finalize
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Write every result to `sink`, then flush it
pub fn emit<S: ReportSink>(sink: &mut S, results: &[TimingResult]) -> Result<(), S::Error> {
    let rows: Vec<ReportRow> = results.iter().map(ReportRow::from).collect();
    sink.consume(&rows)?;
    sink.flush()
}

/// A sink that collects rows in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// The collected rows
    rows: Vec<ReportRow>,

    /// Number of flushes seen
    flushes: usize,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the collected rows
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Whether `flush` has been called
    pub fn is_flushed(&self) -> bool {
        self.flushes > 0
    }

    /// Take ownership of the collected rows
    pub fn take_rows(self) -> Vec<ReportRow> {
        self.rows
    }
}

impl ReportSink for CollectingSink {
    type Error = Infallible;

    fn consume(&mut self, rows: &[ReportRow]) -> Result<(), Self::Error> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_keeps_result_order() {
        let results = vec![
            TimingResult {
                method: "Native (1 Core)".into(),
                algorithm: "ABC".into(),
                parameter: Some(0.1),
                threads: 1,
                mean_seconds: 0.5,
            },
            TimingResult {
                method: "Native (1 Core)".into(),
                algorithm: "Covariance (SQ)".into(),
                parameter: None,
                threads: 1,
                mean_seconds: 0.25,
            },
        ];

        let mut sink = CollectingSink::new();
        emit(&mut sink, &results).unwrap();
        assert!(sink.is_flushed());

        let rows = sink.take_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].algorithm, "ABC");
        assert_eq!(rows[0].parameter, Some(0.1));
        assert_eq!(rows[1].parameter, None);
        assert_eq!(rows[1].value, 0.25);
    }
}
