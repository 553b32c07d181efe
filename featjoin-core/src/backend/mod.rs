//! Matrix backends with pinned parallelism
//!
//! A backend owns a rayon thread pool with exactly the configured number of
//! workers and runs every kernel inside it. Nothing here touches the global
//! pool, so configurations can be measured in any order.

mod kernels;

use std::fmt;

use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Identity of a matrix backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dense products through `ndarray`'s `dot`
    Ndarray,

    /// Hand-written loop kernels
    Native,
}

impl BackendKind {
    /// All known backends
    pub const ALL: [BackendKind; 2] = [BackendKind::Ndarray, BackendKind::Native];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendKind::Ndarray => write!(f, "Ndarray"),
            BackendKind::Native => write!(f, "Native"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ndarray" => Ok(BackendKind::Ndarray),
            "native" => Ok(BackendKind::Native),
            other => Err(Error::InvalidArgument(format!("unknown backend '{other}'"))),
        }
    }
}

/// Algebra operations the workloads need
///
/// Mixed operands are accepted. Products involving a dense operand are
/// dense, sparse times sparse stays sparse, and an elementwise product with
/// any sparse operand is sparse.
pub trait Backend: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Worker threads available to kernels
    fn threads(&self) -> usize;

    /// Matrix product `a · b`
    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;

    /// Elementwise product `a ⊙ b`
    fn hadamard(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;

    /// Transpose
    fn transpose(&self, a: &Matrix) -> Matrix;

    /// Elementwise `max(0, x)`
    fn relu(&self, a: &Matrix) -> Matrix;

    /// Elementwise logistic function; sparse input gives a dense result
    fn sigmoid(&self, a: &Matrix) -> Matrix;

    /// Sum of all entries
    fn sum(&self, a: &Matrix) -> f64;
}

/// A backend running its kernels on a private thread pool
pub struct PooledBackend {
    kind: BackendKind,
    pool: ThreadPool,
    threads: usize,
}

impl PooledBackend {
    /// Build a backend with exactly `parallelism` worker threads
    pub fn new(kind: BackendKind, parallelism: usize) -> Result<Self> {
        if parallelism == 0 {
            return Err(Error::InvalidArgument(
                "parallelism must be at least 1".into(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(move |i| format!("featjoin-{kind}-{i}"))
            .build()?;

        debug!(%kind, threads = parallelism, "built backend thread pool");

        Ok(Self {
            kind,
            pool,
            threads: parallelism,
        })
    }

    fn dense_product(&self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
        match self.kind {
            BackendKind::Ndarray => kernels::blocked_dot(a, b, self.threads),
            BackendKind::Native => kernels::ikj_dot(a, b),
        }
    }
}

impl fmt::Debug for PooledBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PooledBackend")
            .field("kind", &self.kind)
            .field("threads", &self.threads)
            .finish()
    }
}

/// Build a boxed backend for a configuration
pub fn build_backend(kind: BackendKind, parallelism: usize) -> Result<Box<dyn Backend>> {
    Ok(Box::new(PooledBackend::new(kind, parallelism)?))
}

fn check_product(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(Error::Shape(format!(
            "cannot multiply {}x{} by {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    Ok(())
}

fn check_same_shape(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::Shape(format!(
            "elementwise product of {}x{} and {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    Ok(())
}

impl Backend for PooledBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn threads(&self) -> usize {
        self.threads
    }

    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_product(a, b)?;
        self.pool.install(|| match (a, b) {
            (Matrix::Dense(a), Matrix::Dense(b)) => self.dense_product(a, b).map(Matrix::Dense),
            (Matrix::Sparse(a), Matrix::Dense(b)) => kernels::csr_dense(a, b).map(Matrix::Dense),
            (Matrix::Dense(a), Matrix::Sparse(b)) => kernels::dense_csr(a, b).map(Matrix::Dense),
            (Matrix::Sparse(a), Matrix::Sparse(b)) => Ok(Matrix::Sparse(kernels::csr_csr(a, b))),
        })
    }

    fn hadamard(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_same_shape(a, b)?;
        Ok(self.pool.install(|| match (a, b) {
            (Matrix::Dense(a), Matrix::Dense(b)) => Matrix::Dense(kernels::dense_hadamard(a, b)),
            (Matrix::Sparse(a), Matrix::Dense(b)) | (Matrix::Dense(b), Matrix::Sparse(a)) => {
                Matrix::Sparse(kernels::csr_dense_hadamard(a, b))
            }
            (Matrix::Sparse(a), Matrix::Sparse(b)) => {
                Matrix::Sparse(kernels::csr_csr_hadamard(a, b))
            }
        }))
    }

    fn transpose(&self, a: &Matrix) -> Matrix {
        match a {
            Matrix::Dense(a) => Matrix::Dense(a.t().as_standard_layout().into_owned()),
            Matrix::Sparse(a) => Matrix::Sparse(a.transpose()),
        }
    }

    fn relu(&self, a: &Matrix) -> Matrix {
        self.pool.install(|| match a {
            Matrix::Dense(a) => Matrix::Dense(kernels::dense_map(a, |x| x.max(0.0))),
            Matrix::Sparse(a) => Matrix::Sparse(a.map_values(|x| x.max(0.0))),
        })
    }

    fn sigmoid(&self, a: &Matrix) -> Matrix {
        self.pool.install(|| match a {
            Matrix::Dense(a) => Matrix::Dense(kernels::dense_map(a, kernels::logistic)),
            Matrix::Sparse(a) => {
                Matrix::Dense(kernels::dense_map(&a.to_dense(), kernels::logistic))
            }
        })
    }

    fn sum(&self, a: &Matrix) -> f64 {
        match a {
            Matrix::Dense(a) => a.sum(),
            Matrix::Sparse(a) => a.sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{random_matrix, Representation};
    use crate::sparse::CsrMatrix;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            let scale = x.abs().max(y.abs()).max(1.0);
            assert!((x - y).abs() <= 1e-9 * scale, "{x} != {y}");
        }
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        assert!(matches!(
            PooledBackend::new(BackendKind::Native, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pool_has_configured_threads() {
        let backend = PooledBackend::new(BackendKind::Ndarray, 3).unwrap();
        assert_eq!(backend.threads(), 3);
        assert_eq!(backend.pool.current_num_threads(), 3);
    }

    #[test]
    fn test_backend_kind_parsing_and_labels() {
        assert_eq!("NDARRAY".parse::<BackendKind>().unwrap(), BackendKind::Ndarray);
        assert_eq!(BackendKind::Native.to_string(), "Native");
        assert!("blas".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_mismatched_product_is_shape_error() {
        let backend = PooledBackend::new(BackendKind::Native, 1).unwrap();
        let a = Matrix::Dense(Array2::zeros((2, 3)));
        let b = Matrix::Dense(Array2::zeros((2, 3)));
        assert!(matches!(backend.matmul(&a, &b), Err(Error::Shape(_))));
        assert!(backend.hadamard(&a, &b).is_ok());
        assert!(matches!(
            backend.hadamard(&a, &backend.transpose(&b)),
            Err(Error::Shape(_))
        ));
    }

    #[test_case(Representation::Dense, Representation::Dense ; "dense by dense")]
    #[test_case(Representation::Sparse, Representation::Dense ; "sparse by dense")]
    #[test_case(Representation::Dense, Representation::Sparse ; "dense by sparse")]
    #[test_case(Representation::Sparse, Representation::Sparse ; "sparse by sparse")]
    fn test_backends_agree_on_products(left: Representation, right: Representation) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = random_matrix(40, 30, 0.2, left, &mut rng).unwrap().into_matrix();
        let b = random_matrix(30, 20, 0.2, right, &mut rng).unwrap().into_matrix();
        let expected = a.to_dense().dot(&b.to_dense());

        for kind in BackendKind::ALL {
            for threads in [1, 4] {
                let backend = PooledBackend::new(kind, threads).unwrap();
                let product = backend.matmul(&a, &b).unwrap();
                let sparse_out = left == Representation::Sparse && right == Representation::Sparse;
                assert_eq!(product.representation() == Representation::Sparse, sparse_out);
                assert_close(&product.to_dense(), &expected);
            }
        }
    }

    #[test]
    fn test_elementwise_operand_rules() {
        let backend = PooledBackend::new(BackendKind::Ndarray, 2).unwrap();
        let dense = Matrix::Dense(array![[1.0, -2.0], [3.0, 0.0]]);
        let sparse = Matrix::Sparse(CsrMatrix::from_dense(&array![[0.0, 4.0], [-1.0, 0.0]]));

        let product = backend.hadamard(&dense, &sparse).unwrap();
        assert_eq!(product.representation(), Representation::Sparse);
        assert_eq!(product.to_dense(), array![[0.0, -8.0], [-3.0, 0.0]]);

        let relu = backend.relu(&sparse);
        assert_eq!(relu.representation(), Representation::Sparse);
        assert_eq!(relu.nnz(), 1);

        let sigmoid = backend.sigmoid(&sparse);
        assert_eq!(sigmoid.representation(), Representation::Dense);
        assert!((sigmoid.get(0, 0).unwrap() - 0.5).abs() < 1e-12);

        assert!((backend.sum(&dense) - 2.0).abs() < 1e-12);
        assert!((backend.sum(&sparse) - 3.0).abs() < 1e-12);
        assert_eq!(backend.transpose(&dense).to_dense(), array![[1.0, 3.0], [-2.0, 0.0]]);
    }
}
