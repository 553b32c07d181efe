//! Sweep description loaded from JSON

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use featjoin_core::{BackendKind, BenchmarkConfiguration, Representation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Everything a benchmark run needs to know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Backends to compare
    pub backends: Vec<BackendKind>,

    /// Parallelism degrees to sweep
    pub threads: Vec<usize>,

    /// Seed for every generated operand and parameter tensor
    pub seed: u64,

    /// TPC-H inference sweep
    pub tpch: TpchConfig,

    /// Matrix-chain sparsity sweep
    pub matrix_chain: MatrixChainConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let mut threads = vec![1, num_cpus::get()];
        threads.dedup();

        Self {
            backends: BackendKind::ALL.to_vec(),
            threads,
            seed: 42,
            tpch: TpchConfig::default(),
            matrix_chain: MatrixChainConfig::default(),
        }
    }
}

/// Settings of the TPC-H inference sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpchConfig {
    /// Directory holding `lineitem.tbl`, `orders.tbl` and friends
    pub data_dir: PathBuf,

    /// Report file
    pub output: PathBuf,

    /// Field delimiter of the table files
    pub delimiter: char,

    /// Runs per workload
    pub repetitions: usize,

    /// Leading runs discarded
    pub warmup: usize,

    /// Width of the neural network's hidden layers
    pub hidden_width: usize,

    /// Storage of the joined feature matrix
    pub representation: Representation,

    /// Run the join and matrix build inside every timed iteration
    pub end_to_end: bool,
}

impl Default for TpchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/tpch"),
            output: PathBuf::from("results/tpch_inference.csv"),
            delimiter: '|',
            repetitions: 4,
            warmup: 1,
            hidden_width: 25,
            representation: Representation::Dense,
            end_to_end: true,
        }
    }
}

/// Settings of the matrix-chain sparsity sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixChainConfig {
    /// Side length N of the square operands
    pub size: usize,

    /// Density of the fixed sparse operands A and B
    pub base_density: f64,

    /// Densities swept for C
    pub densities: Vec<f64>,

    /// The dense chain's C is N x (N / divisor)
    pub dense_width_divisor: usize,

    /// Runs per workload
    pub repetitions: usize,

    /// Leading runs discarded
    pub warmup: usize,

    /// Report file
    pub output: PathBuf,
}

impl Default for MatrixChainConfig {
    fn default() -> Self {
        Self {
            size: 2000,
            base_density: 0.1,
            densities: vec![0.1, 0.01, 0.001, 0.0001, 0.000_01],
            dense_width_divisor: 400,
            repetitions: 7,
            warmup: 2,
            output: PathBuf::from("results/mat_exps.csv"),
        }
    }
}

impl BenchConfig {
    /// Load a configuration file
    ///
    /// A missing file yields [`BenchConfig::default`] with a warning; a file
    /// that exists but does not parse is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let config = serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "configuration file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check the sweep description before any data is prepared
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::InvalidConfig("no backends selected".into()));
        }
        if self.threads.is_empty() {
            return Err(Error::InvalidConfig("no thread counts selected".into()));
        }
        if !self.tpch.delimiter.is_ascii() {
            return Err(Error::InvalidConfig(format!(
                "delimiter '{}' is not a single byte",
                self.tpch.delimiter
            )));
        }
        if self.tpch.hidden_width == 0 {
            return Err(Error::InvalidConfig("hidden width must be at least 1".into()));
        }

        let chain = &self.matrix_chain;
        if chain.size == 0 {
            return Err(Error::InvalidConfig("matrix size must be at least 1".into()));
        }
        if chain.dense_width_divisor == 0 || chain.dense_width_divisor > chain.size {
            return Err(Error::InvalidConfig(format!(
                "dense width divisor {} must lie in 1..={}",
                chain.dense_width_divisor, chain.size
            )));
        }
        if chain.densities.is_empty() {
            return Err(Error::InvalidConfig("no densities selected".into()));
        }
        if !(0.0..=1.0).contains(&chain.base_density) {
            return Err(Error::InvalidConfig(format!(
                "base density {} outside [0, 1]",
                chain.base_density
            )));
        }

        let tpch = self.tpch_configurations();
        let matrix_chain = self.chain_configurations();
        for configuration in tpch.iter().chain(&matrix_chain) {
            configuration.validate()?;
        }
        Ok(())
    }

    /// Backend × thread configurations of the TPC-H sweep
    pub fn tpch_configurations(&self) -> Vec<BenchmarkConfiguration> {
        self.backends
            .iter()
            .flat_map(|&backend| {
                self.threads.iter().map(move |&threads| {
                    BenchmarkConfiguration::new(
                        backend,
                        threads,
                        self.tpch.repetitions,
                        self.tpch.warmup,
                    )
                })
            })
            .collect()
    }

    /// Backend × thread × density configurations of the matrix-chain sweep
    pub fn chain_configurations(&self) -> Vec<BenchmarkConfiguration> {
        let chain = &self.matrix_chain;
        let mut configurations = Vec::new();
        for &backend in &self.backends {
            for &threads in &self.threads {
                for &density in &chain.densities {
                    let configuration = BenchmarkConfiguration::new(
                        backend,
                        threads,
                        chain.repetitions,
                        chain.warmup,
                    );
                    configurations.push(configuration.with_density(density));
                }
            }
        }
        configurations
    }
}
