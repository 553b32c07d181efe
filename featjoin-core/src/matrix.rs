//! Feature matrices and the table-to-matrix builder

use std::fmt;

use ndarray::Array2;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::{Column, ColumnData};
use crate::error::{Error, Result};
use crate::schema::Field;
use crate::sparse::CsrMatrix;
use crate::table::Table;

/// Physical representation of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    /// Row-major dense storage
    Dense,

    /// Compressed sparse rows
    Sparse,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Representation::Dense => write!(f, "dense"),
            Representation::Sparse => write!(f, "sparse"),
        }
    }
}

/// A 2-D numeric matrix in either representation
#[derive(Debug, Clone, PartialEq)]
pub enum Matrix {
    /// Dense matrix
    Dense(Array2<f64>),

    /// Sparse matrix
    Sparse(CsrMatrix),
}

impl Matrix {
    /// Number of rows
    pub fn rows(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.nrows(),
            Matrix::Sparse(m) => m.rows(),
        }
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.ncols(),
            Matrix::Sparse(m) => m.cols(),
        }
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Representation kind
    pub fn representation(&self) -> Representation {
        match self {
            Matrix::Dense(_) => Representation::Dense,
            Matrix::Sparse(_) => Representation::Sparse,
        }
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.iter().filter(|&&v| v != 0.0).count(),
            Matrix::Sparse(m) => m.nnz(),
        }
    }

    /// Fraction of non-zero entries
    pub fn density(&self) -> f64 {
        let total = self.rows() as f64 * self.cols() as f64;
        if total == 0.0 {
            0.0
        } else {
            self.nnz() as f64 / total
        }
    }

    /// Value at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        match self {
            Matrix::Dense(m) => m.get([row, col]).copied(),
            Matrix::Sparse(m) => Some(m.get(row, col)),
        }
    }

    /// Dense copy of this matrix
    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            Matrix::Dense(m) => m.clone(),
            Matrix::Sparse(m) => m.to_dense(),
        }
    }
}

impl From<Array2<f64>> for Matrix {
    fn from(m: Array2<f64>) -> Self {
        Matrix::Dense(m)
    }
}

impl From<CsrMatrix> for Matrix {
    fn from(m: CsrMatrix) -> Self {
        Matrix::Sparse(m)
    }
}

/// A numeric matrix produced for a workload, with its provenance
///
/// Rows and columns are fixed for the lifetime of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// The numeric data
    matrix: Matrix,

    /// Requested density for synthetic matrices
    target_density: Option<f64>,
}

impl FeatureMatrix {
    /// Wrap a matrix without a target density
    pub fn new(matrix: Matrix) -> Self {
        Self {
            matrix,
            target_density: None,
        }
    }

    /// Wrap a synthetic matrix generated at `density`
    pub fn with_target_density(matrix: Matrix, density: f64) -> Self {
        Self {
            matrix,
            target_density: Some(density),
        }
    }

    /// The underlying matrix
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Take the underlying matrix
    pub fn into_matrix(self) -> Matrix {
        self.matrix
    }

    /// Row count R
    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Column count C
    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }

    /// Representation kind
    pub fn representation(&self) -> Representation {
        self.matrix.representation()
    }

    /// Requested density, if this matrix was generated
    pub fn target_density(&self) -> Option<f64> {
        self.target_density
    }

    /// Observed fraction of non-zero entries
    pub fn observed_density(&self) -> f64 {
        self.matrix.density()
    }
}

/// Borrowed numeric view of a matrix-ready column
enum NumericColumn<'a> {
    Int(&'a [i64]),
    Float(&'a [f64]),
}

impl NumericColumn<'_> {
    fn get(&self, row: usize) -> f64 {
        match self {
            NumericColumn::Int(v) => v[row] as f64,
            NumericColumn::Float(v) => v[row],
        }
    }
}

/// Reject a field that cannot become a feature matrix column
///
/// Key and numeric fields of integer or float type are accepted.
pub fn check_feature_field(field: &Field) -> Result<()> {
    if !field.is_numeric() {
        return Err(Error::Type(format!(
            "column '{}' is {} {} and cannot enter a feature matrix; encode it first",
            field.name(),
            field.kind(),
            field.data_type()
        )));
    }
    Ok(())
}

fn numeric_column(column: &Column) -> Result<NumericColumn<'_>> {
    check_feature_field(column.field())?;
    match column.data() {
        ColumnData::Int64(v) => Ok(NumericColumn::Int(v)),
        ColumnData::Float64(v) => Ok(NumericColumn::Float(v)),
        ColumnData::Utf8(_) => Err(Error::Type(format!(
            "column '{}' holds strings",
            column.name()
        ))),
    }
}

/// Convert every column of `table`, in column order, into a numeric matrix
///
/// Key and numeric columns are accepted; categorical or string columns fail
/// with [`Error::Type`]. The sparse path builds CSR rows directly without a
/// dense intermediate.
pub fn to_matrix(table: &Table, representation: Representation) -> Result<FeatureMatrix> {
    let columns = table
        .columns()
        .iter()
        .map(numeric_column)
        .collect::<Result<Vec<_>>>()?;

    let rows = table.row_count();
    let cols = columns.len();

    let matrix = match representation {
        Representation::Dense => {
            let mut dense = Array2::zeros((rows, cols));
            for (c, column) in columns.iter().enumerate() {
                for r in 0..rows {
                    dense[[r, c]] = column.get(r);
                }
            }
            Matrix::Dense(dense)
        }
        Representation::Sparse => {
            let entries = (0..rows)
                .map(|r| {
                    columns
                        .iter()
                        .enumerate()
                        .map(|(c, column)| (c, column.get(r)))
                        .filter(|&(_, v)| v != 0.0)
                        .collect()
                })
                .collect();
            Matrix::Sparse(CsrMatrix::from_sorted_rows(cols, entries))
        }
    };

    debug!(rows, cols, %representation, nnz = matrix.nnz(), "built feature matrix");
    Ok(FeatureMatrix::new(matrix))
}

fn check_density(density: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&density) {
        return Err(Error::InvalidArgument(format!(
            "density {density} outside [0, 1]"
        )));
    }
    Ok(())
}

/// Uniform value in `(0, 1]`, never zero so sampled entries stay non-zero
fn nonzero_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.gen::<f64>()
}

/// Generate a `rows x cols` matrix whose non-zero entries are sampled at `density`
///
/// The sparse path draws exactly `round(density * rows * cols)` distinct
/// positions and never allocates a dense array. The dense path keeps each
/// entry independently with probability `density`.
pub fn random_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    density: f64,
    representation: Representation,
    rng: &mut R,
) -> Result<FeatureMatrix> {
    check_density(density)?;
    let total = rows.checked_mul(cols).ok_or_else(|| {
        Error::InvalidArgument(format!("a {rows}x{cols} matrix has too many entries"))
    })?;

    let matrix = match representation {
        Representation::Sparse => {
            let amount = ((density * total as f64).round() as usize).min(total);
            let triplets = index::sample(rng, total, amount)
                .into_iter()
                .map(|pos| (pos / cols, pos % cols, nonzero_uniform(rng)))
                .collect::<Vec<_>>();
            Matrix::Sparse(CsrMatrix::from_triplets(rows, cols, triplets)?)
        }
        Representation::Dense => {
            let dense = Array2::from_shape_fn((rows, cols), |_| {
                if density >= 1.0 || rng.gen_bool(density) {
                    nonzero_uniform(rng)
                } else {
                    0.0
                }
            });
            Matrix::Dense(dense)
        }
    };

    debug!(rows, cols, density, %representation, nnz = matrix.nnz(), "generated random matrix");
    Ok(FeatureMatrix::with_target_density(matrix, density))
}

/// Dense parameter tensor with entries uniform in `[0, 1)`
pub fn uniform_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}
