//! Benchmark engine for join-then-linear-algebra feature pipelines
//!
//! Relational tables are encoded, joined along a declared topology and built
//! into a dense or sparse feature matrix. A fixed registry of algebraic
//! workloads then runs against that matrix on a pluggable backend, timed by
//! a warm-up aware harness across a sweep of backend, parallelism and
//! sparsity configurations.

#![warn(missing_docs)]

pub mod backend;
pub mod column;
pub mod encode;
pub mod error;
pub mod join;
pub mod matrix;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod sparse;
pub mod sweep;
pub mod table;
pub mod timing;
pub mod transform;
pub mod workload;

// Re-export key types for convenience
pub use backend::{build_backend, Backend, BackendKind, PooledBackend};
pub use column::{Column, ColumnData, Value};
pub use encode::{dictionary_encode, one_hot_encode, one_hot_encode_all, KeyDictionary};
pub use error::{Error, Result};
pub use join::{
    compose, output_schema, JoinKeys, JoinSpec, JoinStep, SuffixPolicy, TableSet, Topology,
};
pub use matrix::{random_matrix, to_matrix, FeatureMatrix, Matrix, Representation};
pub use pipeline::FeaturePipeline;
pub use schema::{ColumnKind, DataType, Field, Schema};
pub use sink::{CollectingSink, ReportRow, ReportSink};
pub use sparse::CsrMatrix;
pub use sweep::{
    run_sweep, run_sweep_with_clock, BenchmarkConfiguration, ChainSpec, MatrixSpec, OperandSource,
    SweepFailure, SweepOutcome, TimingResult, WorkloadCase,
};
pub use table::Table;
pub use timing::{Clock, FakeClock, Measurement, Phase, SystemClock, TimingHarness};
pub use transform::{TableTransform, TransformChain};
pub use workload::{Operands, Workload};
