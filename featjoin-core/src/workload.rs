//! The workload registry: fixed algebraic computations over feature matrices

use std::fmt;
use std::sync::Arc;

use ndarray::Array2;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::matrix::{FeatureMatrix, Matrix};
use crate::pipeline::FeaturePipeline;

/// Inputs a workload runs against
#[derive(Debug, Clone)]
pub enum Operands {
    /// A prebuilt feature matrix X
    Matrix(Arc<FeatureMatrix>),

    /// Tables joined and built into X inside every run
    Pipeline(Arc<FeaturePipeline>),

    /// The three matrices A, B, C of a chain workload
    Chain([Arc<FeatureMatrix>; 3]),
}

impl Operands {
    /// Chain operands from owned matrices
    pub fn chain(a: FeatureMatrix, b: FeatureMatrix, c: FeatureMatrix) -> Self {
        Operands::Chain([Arc::new(a), Arc::new(b), Arc::new(c)])
    }

    /// Column count C of the feature operand
    pub fn feature_width(&self) -> Result<usize> {
        match self {
            Operands::Matrix(m) => Ok(m.cols()),
            Operands::Pipeline(p) => p.width(),
            Operands::Chain(_) => Err(Error::InvalidArgument(
                "chain operands have no single feature matrix".into(),
            )),
        }
    }
}

impl From<FeatureMatrix> for Operands {
    fn from(matrix: FeatureMatrix) -> Self {
        Operands::Matrix(Arc::new(matrix))
    }
}

impl From<FeaturePipeline> for Operands {
    fn from(pipeline: FeaturePipeline) -> Self {
        Operands::Pipeline(Arc::new(pipeline))
    }
}

/// A parameterized computation
///
/// Vector parameters are stored as `n x 1` matrices.
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    /// `X · theta`
    LinearRegression {
        /// Weights, `C x 1`
        theta: Matrix,
    },

    /// `sigmoid(X · theta)`
    LogisticRegression {
        /// Weights, `C x 1`
        theta: Matrix,
    },

    /// `Xᵀ · X`
    Covariance,

    /// `sigmoid(relu(relu(X · W1) · W2) · W3)`
    NeuralNetForward {
        /// Input layer, `C x H`
        w1: Matrix,
        /// Hidden layer, `H x H`
        w2: Matrix,
        /// Output layer, `H x 1`
        w3: Matrix,
    },

    /// `A · B · C`
    ChainProduct,

    /// `C · B · A`
    ChainProductReversed,

    /// `Σ (A · B · C)` as a 1x1 matrix
    ChainProductSum,

    /// `A ⊙ B ⊙ C`
    ElementwiseProduct,
}

fn param(values: Array2<f64>) -> Matrix {
    Matrix::Dense(values)
}

impl Workload {
    /// Linear regression with weights `theta` (`C x 1`)
    pub fn linear_regression(theta: Array2<f64>) -> Self {
        Workload::LinearRegression { theta: param(theta) }
    }

    /// Logistic regression with weights `theta` (`C x 1`)
    pub fn logistic_regression(theta: Array2<f64>) -> Self {
        Workload::LogisticRegression { theta: param(theta) }
    }

    /// Three-layer forward pass
    pub fn neural_net_forward(w1: Array2<f64>, w2: Array2<f64>, w3: Array2<f64>) -> Self {
        Workload::NeuralNetForward {
            w1: param(w1),
            w2: param(w2),
            w3: param(w3),
        }
    }

    /// Short name of the computation
    pub fn name(&self) -> &'static str {
        match self {
            Workload::LinearRegression { .. } => "LinearRegression",
            Workload::LogisticRegression { .. } => "LogisticRegression",
            Workload::Covariance => "Covariance",
            Workload::NeuralNetForward { .. } => "NeuralNetForward",
            Workload::ChainProduct => "ChainProduct",
            Workload::ChainProductReversed => "ChainProductReversed",
            Workload::ChainProductSum => "ChainProductSum",
            Workload::ElementwiseProduct => "ElementwiseProduct",
        }
    }

    /// Whether this workload consumes chain operands
    pub fn is_chain(&self) -> bool {
        matches!(
            self,
            Workload::ChainProduct
                | Workload::ChainProductReversed
                | Workload::ChainProductSum
                | Workload::ElementwiseProduct
        )
    }

    /// Check operand kinds and every inner dimension before anything runs
    pub fn validate(&self, operands: &Operands) -> Result<()> {
        match (self.is_chain(), operands) {
            (true, Operands::Chain(chain)) => self.validate_chain(chain),
            (false, Operands::Matrix(_) | Operands::Pipeline(_)) => {
                self.validate_features(operands.feature_width()?)
            }
            (true, _) => Err(Error::InvalidArgument(format!(
                "{} needs chain operands",
                self.name()
            ))),
            (false, _) => Err(Error::InvalidArgument(format!(
                "{} needs a feature matrix",
                self.name()
            ))),
        }
    }

    fn validate_features(&self, width: usize) -> Result<()> {
        match self {
            Workload::LinearRegression { theta } | Workload::LogisticRegression { theta } => {
                expect_rows("theta", theta, width)
            }
            Workload::NeuralNetForward { w1, w2, w3 } => {
                expect_rows("W1", w1, width)?;
                expect_rows("W2", w2, w1.cols())?;
                expect_rows("W3", w3, w2.cols())
            }
            _ => Ok(()),
        }
    }

    fn validate_chain(&self, [a, b, c]: &[Arc<FeatureMatrix>; 3]) -> Result<()> {
        let (a, b, c) = (a.matrix(), b.matrix(), c.matrix());
        match self {
            Workload::ChainProduct | Workload::ChainProductSum => {
                expect_inner("A · B", a, b)?;
                expect_inner("(A · B) · C", b, c)
            }
            Workload::ChainProductReversed => {
                expect_inner("C · B", c, b)?;
                expect_inner("(C · B) · A", b, a)
            }
            Workload::ElementwiseProduct => {
                if a.shape() != b.shape() || b.shape() != c.shape() {
                    return Err(Error::Shape(format!(
                        "elementwise operands differ: {:?}, {:?}, {:?}",
                        a.shape(),
                        b.shape(),
                        c.shape()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Run the computation once
    pub fn execute(&self, backend: &dyn Backend, operands: &Operands) -> Result<Matrix> {
        match operands {
            Operands::Matrix(x) => self.execute_features(backend, x.matrix()),
            Operands::Pipeline(pipeline) => {
                let x = pipeline.materialize()?;
                self.execute_features(backend, x.matrix())
            }
            Operands::Chain([a, b, c]) => {
                self.execute_chain(backend, a.matrix(), b.matrix(), c.matrix())
            }
        }
    }

    fn execute_features(&self, backend: &dyn Backend, x: &Matrix) -> Result<Matrix> {
        match self {
            Workload::LinearRegression { theta } => backend.matmul(x, theta),
            Workload::LogisticRegression { theta } => {
                Ok(backend.sigmoid(&backend.matmul(x, theta)?))
            }
            Workload::Covariance => backend.matmul(&backend.transpose(x), x),
            Workload::NeuralNetForward { w1, w2, w3 } => {
                let h1 = backend.relu(&backend.matmul(x, w1)?);
                let h2 = backend.relu(&backend.matmul(&h1, w2)?);
                Ok(backend.sigmoid(&backend.matmul(&h2, w3)?))
            }
            _ => Err(Error::InvalidArgument(format!(
                "{} needs chain operands",
                self.name()
            ))),
        }
    }

    fn execute_chain(
        &self,
        backend: &dyn Backend,
        a: &Matrix,
        b: &Matrix,
        c: &Matrix,
    ) -> Result<Matrix> {
        match self {
            Workload::ChainProduct => backend.matmul(&backend.matmul(a, b)?, c),
            Workload::ChainProductReversed => backend.matmul(&backend.matmul(c, b)?, a),
            Workload::ChainProductSum => {
                let product = backend.matmul(&backend.matmul(a, b)?, c)?;
                Ok(Matrix::Dense(Array2::from_elem((1, 1), backend.sum(&product))))
            }
            Workload::ElementwiseProduct => backend.hadamard(&backend.hadamard(a, b)?, c),
            _ => Err(Error::InvalidArgument(format!(
                "{} needs a feature matrix",
                self.name()
            ))),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn expect_rows(name: &str, parameter: &Matrix, rows: usize) -> Result<()> {
    if parameter.rows() != rows {
        return Err(Error::Shape(format!(
            "{name} is {}x{} but must have {rows} rows",
            parameter.rows(),
            parameter.cols()
        )));
    }
    Ok(())
}

fn expect_inner(what: &str, left: &Matrix, right: &Matrix) -> Result<()> {
    if left.cols() != right.rows() {
        return Err(Error::Shape(format!(
            "{what}: inner dimensions {} and {} differ",
            left.cols(),
            right.rows()
        )));
    }
    Ok(())
}
