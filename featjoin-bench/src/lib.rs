//! Benchmark driver for featjoin
//!
//! Two sweeps are provided: TPC-H inference over joined feature matrices and
//! a matrix-chain microbenchmark over sparsity levels. Both read their
//! description from a [`BenchConfig`] and write a
//! `Method,Algorithm,Sparsity,Runtime` report.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod matrix_chain;
pub mod tpch;

use std::path::Path;

use featjoin_core::sink::emit;
use featjoin_core::{run_sweep, SweepOutcome, TimingResult};
use featjoin_readers::CsvReportWriter;
use tracing::{info, warn};

pub use config::{BenchConfig, MatrixChainConfig, TpchConfig};
pub use error::{Error, Result};

/// Load, prepare and measure the TPC-H inference workloads
pub fn run_tpch(config: &BenchConfig) -> Result<SweepOutcome> {
    let delimiter = u8::try_from(config.tpch.delimiter).map_err(|_| {
        Error::InvalidConfig(format!("delimiter '{}' is not a single byte", config.tpch.delimiter))
    })?;

    let raw = tpch::load_tables(&config.tpch.data_dir, delimiter)?;
    let tables = tpch::prepare(&raw)?;
    let cases = tpch::cases(&tables, &config.tpch, config.seed)?;

    let configurations = config.tpch_configurations();
    info!(cases = cases.len(), configurations = configurations.len(), "starting TPC-H sweep");
    Ok(run_sweep(&configurations, &cases)?)
}

/// Measure the matrix-chain workloads across the density sweep
pub fn run_matrix_chain(config: &BenchConfig) -> Result<SweepOutcome> {
    let cases = matrix_chain::cases(&config.matrix_chain, config.seed);
    let configurations = config.chain_configurations();
    info!(
        cases = cases.len(),
        configurations = configurations.len(),
        size = config.matrix_chain.size,
        "starting matrix-chain sweep"
    );
    Ok(run_sweep(&configurations, &cases)?)
}

/// Write results to a report file, returning the number of rows written
pub fn write_report<P: AsRef<Path>>(path: P, results: &[TimingResult]) -> Result<usize> {
    let mut writer = CsvReportWriter::create(path)?;
    emit(&mut writer, results)?;
    Ok(writer.rows_written())
}

/// Log every failed pair of a sweep
pub fn log_failures(outcome: &SweepOutcome) {
    for failure in &outcome.failures {
        warn!(
            method = %failure.method,
            algorithm = %failure.algorithm,
            parameter = ?failure.parameter,
            error = %failure.error,
            "measurement excluded from report"
        );
    }
}
