//! Matrix-chain sparsity microbenchmark
//!
//! A and B are N x N sparse at a fixed base density while C's density is
//! swept. The elementwise case multiplies dense A and B into the swept C,
//! and the dense case times a fully dense chain with a narrow C.

use featjoin_core::{ChainSpec, MatrixSpec, OperandSource, Representation, Workload, WorkloadCase};

use crate::config::MatrixChainConfig;

/// The five chain workloads in report order
pub fn cases(config: &MatrixChainConfig, seed: u64) -> Vec<WorkloadCase> {
    let n = config.size;
    let sparse = ChainSpec {
        a: MatrixSpec::fixed(n, n, Representation::Sparse, config.base_density),
        b: MatrixSpec::fixed(n, n, Representation::Sparse, config.base_density),
        c: MatrixSpec::swept(n, n, Representation::Sparse),
        seed,
    };
    let mixed = ChainSpec {
        a: MatrixSpec::fixed(n, n, Representation::Dense, 1.0),
        b: MatrixSpec::fixed(n, n, Representation::Dense, 1.0),
        ..sparse.clone()
    };
    let dense = ChainSpec {
        a: MatrixSpec::fixed(n, n, Representation::Dense, 1.0),
        b: MatrixSpec::fixed(n, n, Representation::Dense, 1.0),
        c: MatrixSpec::fixed(n, n / config.dense_width_divisor, Representation::Dense, 1.0),
        seed,
    };

    vec![
        WorkloadCase::new(
            "ABC",
            Workload::ChainProduct,
            OperandSource::RandomChain(sparse.clone()),
        ),
        WorkloadCase::new(
            "CBA",
            Workload::ChainProductReversed,
            OperandSource::RandomChain(sparse.clone()),
        ),
        WorkloadCase::new(
            "SUM(ABC)",
            Workload::ChainProductSum,
            OperandSource::RandomChain(sparse),
        ),
        WorkloadCase::new("A*B*C", Workload::ElementwiseProduct, OperandSource::RandomChain(mixed)),
        WorkloadCase::new("ABC Dense", Workload::ChainProduct, OperandSource::RandomChain(dense)),
    ]
}
