//! Configuration sweeps over workload cases

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::backend::{build_backend, Backend, BackendKind};
use crate::error::{Error, Result};
use crate::matrix::{random_matrix, Representation};
use crate::timing::{Clock, SystemClock, TimingHarness};
use crate::workload::{Operands, Workload};

/// One point of a sweep: backend, parallelism, sparsity and repetition protocol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfiguration {
    /// Backend identity
    pub backend: BackendKind,

    /// Worker threads available to the backend
    pub parallelism: usize,

    /// Sparsity level for generated operands
    #[serde(default)]
    pub density: Option<f64>,

    /// Total runs per workload
    pub repetitions: usize,

    /// Leading runs discarded
    pub warmup: usize,
}

impl BenchmarkConfiguration {
    /// A configuration without a sparsity level
    pub fn new(
        backend: BackendKind,
        parallelism: usize,
        repetitions: usize,
        warmup: usize,
    ) -> Self {
        Self {
            backend,
            parallelism,
            density: None,
            repetitions,
            warmup,
        }
    }

    /// Set the sparsity level
    #[must_use]
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    /// Check the invariants of a configuration
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(Error::InvalidArgument("parallelism must be at least 1".into()));
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidArgument("repetitions must be at least 1".into()));
        }
        if self.warmup >= self.repetitions {
            return Err(Error::InvalidArgument(format!(
                "warm-up count {} must be below repetition count {}",
                self.warmup, self.repetitions
            )));
        }
        if let Some(density) = self.density {
            if !(0.0..=1.0).contains(&density) {
                return Err(Error::InvalidArgument(format!(
                    "density {density} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Method label, e.g. `Native (4 Core)`
    pub fn method_label(&self) -> String {
        format!("{} ({} Core)", self.backend, self.parallelism)
    }
}

/// Mean runtime of one (workload, configuration) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Backend and parallelism label
    pub method: String,

    /// Workload label
    pub algorithm: String,

    /// Sparsity level, when the configuration has one
    pub parameter: Option<f64>,

    /// Parallelism degree
    pub threads: usize,

    /// Mean seconds over post-warm-up repetitions
    pub mean_seconds: f64,
}

/// Shape and representation of one generated chain operand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixSpec {
    /// Rows
    pub rows: usize,

    /// Columns
    pub cols: usize,

    /// Storage
    pub representation: Representation,

    /// Fixed density; `None` takes the configuration's sparsity level
    pub density: Option<f64>,
}

impl MatrixSpec {
    /// Operand whose density follows the sweep
    pub fn swept(rows: usize, cols: usize, representation: Representation) -> Self {
        Self {
            rows,
            cols,
            representation,
            density: None,
        }
    }

    /// Operand with a fixed density
    pub fn fixed(rows: usize, cols: usize, representation: Representation, density: f64) -> Self {
        Self {
            rows,
            cols,
            representation,
            density: Some(density),
        }
    }
}

/// Recipe for random A, B, C chain operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Left operand
    pub a: MatrixSpec,

    /// Middle operand
    pub b: MatrixSpec,

    /// Right operand
    pub c: MatrixSpec,

    /// Seed for the generator
    pub seed: u64,
}

impl ChainSpec {
    /// Generate the operands for a sparsity level
    ///
    /// The same seed yields the same operands for every configuration.
    pub fn generate(&self, density: Option<f64>) -> Result<Operands> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut build = |spec: &MatrixSpec| {
            let density = spec.density.or(density).ok_or_else(|| {
                Error::InvalidArgument("generated operand needs a density".into())
            })?;
            random_matrix(spec.rows, spec.cols, density, spec.representation, &mut rng)
        };
        let a = build(&self.a)?;
        let b = build(&self.b)?;
        let c = build(&self.c)?;
        Ok(Operands::chain(a, b, c))
    }
}

/// Where a case's operands come from
#[derive(Debug, Clone)]
pub enum OperandSource {
    /// Operands shared read-only by every configuration
    Fixed(Operands),

    /// Chain operands generated per sparsity level, outside the timed region
    RandomChain(ChainSpec),
}

impl OperandSource {
    fn resolve(&self, configuration: &BenchmarkConfiguration) -> Result<Operands> {
        match self {
            OperandSource::Fixed(operands) => Ok(operands.clone()),
            OperandSource::RandomChain(spec) => spec.generate(configuration.density),
        }
    }
}

/// A labelled workload with its operands
#[derive(Debug, Clone)]
pub struct WorkloadCase {
    /// Algorithm label for the report
    pub algorithm: String,

    /// The computation
    pub workload: Workload,

    /// Its inputs
    pub operands: OperandSource,
}

impl WorkloadCase {
    /// Create a case
    pub fn new(algorithm: &str, workload: Workload, operands: OperandSource) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            workload,
            operands,
        }
    }
}

/// A pair that failed and was left out of the results
#[derive(Debug)]
pub struct SweepFailure {
    /// Backend and parallelism label
    pub method: String,

    /// Workload label
    pub algorithm: String,

    /// Sparsity level
    pub parameter: Option<f64>,

    /// Why it failed
    pub error: Error,
}

/// Everything a sweep produced
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Successful measurements in sweep order
    pub results: Vec<TimingResult>,

    /// Failed pairs with their causes
    pub failures: Vec<SweepFailure>,
}

/// Measure every case under every configuration with the wall clock
pub fn run_sweep(
    configurations: &[BenchmarkConfiguration],
    cases: &[WorkloadCase],
) -> Result<SweepOutcome> {
    run_sweep_with_clock(configurations, cases, SystemClock::new())
}

/// Measure every case under every configuration, reading time from `clock`
///
/// Invalid configurations or backends that cannot be built abort the sweep.
/// A failing (case, configuration) pair is logged, recorded in
/// [`SweepOutcome::failures`] and skipped.
#[instrument(skip_all, fields(configurations = configurations.len(), cases = cases.len()))]
pub fn run_sweep_with_clock<C: Clock>(
    configurations: &[BenchmarkConfiguration],
    cases: &[WorkloadCase],
    clock: C,
) -> Result<SweepOutcome> {
    for configuration in configurations {
        configuration.validate()?;
    }

    let mut harness = TimingHarness::new(clock);
    let mut outcome = SweepOutcome::default();

    for configuration in configurations {
        let backend = build_backend(configuration.backend, configuration.parallelism)?;
        let method = configuration.method_label();
        info!(
            method = %method,
            density = ?configuration.density,
            repetitions = configuration.repetitions,
            warmup = configuration.warmup,
            "configuration started"
        );

        for case in cases {
            match measure_case(&mut harness, backend.as_ref(), configuration, case) {
                Ok(mean_seconds) => {
                    info!(
                        method = %method,
                        algorithm = %case.algorithm,
                        mean_seconds,
                        "measurement finished"
                    );
                    outcome.results.push(TimingResult {
                        method: method.clone(),
                        algorithm: case.algorithm.clone(),
                        parameter: configuration.density,
                        threads: configuration.parallelism,
                        mean_seconds,
                    });
                }
                Err(error) => {
                    warn!(
                        method = %method,
                        algorithm = %case.algorithm,
                        %error,
                        "measurement failed"
                    );
                    outcome.failures.push(SweepFailure {
                        method: method.clone(),
                        algorithm: case.algorithm.clone(),
                        parameter: configuration.density,
                        error,
                    });
                }
            }
        }
    }

    Ok(outcome)
}

fn measure_case<C: Clock>(
    harness: &mut TimingHarness<C>,
    backend: &dyn Backend,
    configuration: &BenchmarkConfiguration,
    case: &WorkloadCase,
) -> Result<f64> {
    let prepare = || -> Result<Operands> {
        let operands = case.operands.resolve(configuration)?;
        case.workload.validate(&operands)?;
        Ok(operands)
    };
    let operands = prepare().map_err(|e| Error::benchmark(&case.algorithm, e))?;

    harness.measure(
        &case.algorithm,
        configuration.repetitions,
        configuration.warmup,
        || case.workload.execute(backend, &operands),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{FeatureMatrix, Matrix};
    use crate::timing::FakeClock;
    use ndarray::{array, Array2};
    use std::time::Duration;

    #[test]
    fn test_configuration_validation() {
        let ok = BenchmarkConfiguration::new(BackendKind::Native, 2, 7, 2);
        assert!(ok.validate().is_ok());
        assert!(ok.with_density(0.01).validate().is_ok());
        assert!(ok.with_density(2.0).validate().is_err());
        assert!(BenchmarkConfiguration::new(BackendKind::Native, 0, 7, 2).validate().is_err());
        assert!(BenchmarkConfiguration::new(BackendKind::Native, 1, 0, 0).validate().is_err());
        assert!(BenchmarkConfiguration::new(BackendKind::Native, 1, 2, 2).validate().is_err());
    }

    #[test]
    fn test_method_label() {
        let config = BenchmarkConfiguration::new(BackendKind::Ndarray, 24, 4, 1);
        assert_eq!(config.method_label(), "Ndarray (24 Core)");
    }

    #[test]
    fn test_configuration_from_json() {
        let config: BenchmarkConfiguration = serde_json::from_str(
            r#"{"backend": "native", "parallelism": 4, "repetitions": 7, "warmup": 2}"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.density, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chain_generation_is_deterministic() {
        let spec = ChainSpec {
            a: MatrixSpec::fixed(20, 20, Representation::Sparse, 0.1),
            b: MatrixSpec::fixed(20, 20, Representation::Sparse, 0.1),
            c: MatrixSpec::swept(20, 20, Representation::Sparse),
            seed: 5,
        };
        let Operands::Chain(first) = spec.generate(Some(0.05)).unwrap() else {
            panic!("expected chain operands");
        };
        let Operands::Chain(second) = spec.generate(Some(0.05)).unwrap() else {
            panic!("expected chain operands");
        };
        assert_eq!(first[2].matrix(), second[2].matrix());
        assert_eq!(first[2].target_density(), Some(0.05));
        assert_eq!(first[0].target_density(), Some(0.1));
        assert!(spec.generate(None).is_err());
    }

    #[test]
    fn test_failed_pair_is_excluded_and_sweep_continues() {
        let x: Operands = FeatureMatrix::new(Matrix::Dense(array![[1.0, 2.0]])).into();
        let cases = vec![
            WorkloadCase::new(
                "bad",
                Workload::linear_regression(Array2::zeros((3, 1))),
                OperandSource::Fixed(x.clone()),
            ),
            WorkloadCase::new(
                "good",
                Workload::linear_regression(array![[1.0], [1.0]]),
                OperandSource::Fixed(x),
            ),
        ];
        let configs = [
            BenchmarkConfiguration::new(BackendKind::Native, 1, 3, 1),
            BenchmarkConfiguration::new(BackendKind::Ndarray, 2, 3, 1),
        ];

        let clock = FakeClock::with_iterations(&[Duration::from_millis(4); 6]);
        let outcome = run_sweep_with_clock(&configs, &cases, clock).unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.algorithm == "good"));
        assert_eq!(outcome.results[1].method, "Ndarray (2 Core)");
        assert!((outcome.results[0].mean_seconds - 0.004).abs() < 1e-12);

        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| f.error.is_shape_error()));
    }

    #[test]
    fn test_invalid_configuration_aborts_sweep() {
        let configs = [BenchmarkConfiguration::new(BackendKind::Native, 1, 2, 5)];
        assert!(matches!(run_sweep(&configs, &[]), Err(Error::InvalidArgument(_))));
    }
}
