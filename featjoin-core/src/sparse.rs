//! Compressed sparse row matrices

use std::fmt;

use ndarray::Array2;

use crate::error::{Error, Result};

/// A matrix in compressed sparse row (CSR) format
///
/// Row `i` owns the entries `indptr[i]..indptr[i + 1]` of `indices` and
/// `values`; column indices within a row are strictly increasing and no
/// stored value is zero.
#[derive(Clone, PartialEq)]
pub struct CsrMatrix {
    /// Number of rows
    rows: usize,

    /// Number of columns
    cols: usize,

    /// Row pointers, `rows + 1` entries
    indptr: Vec<usize>,

    /// Column index of each stored value
    indices: Vec<usize>,

    /// Stored non-zero values
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from its raw arrays, validating the layout
    ///
    /// Stored values must be non-zero; an explicit zero is an
    /// [`Error::InvalidArgument`].
    pub fn from_csr(
        rows: usize,
        cols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if indptr.len() != rows + 1 {
            return Err(Error::Shape(format!(
                "row pointers have {} entries, expected {}",
                indptr.len(),
                rows + 1
            )));
        }

        if indices.len() != values.len() {
            return Err(Error::Shape(
                "column indices length must match values length".into(),
            ));
        }

        if let Some(position) = values.iter().position(|&v| v == 0.0) {
            return Err(Error::InvalidArgument(format!(
                "stored value {position} is an explicit zero"
            )));
        }

        if indptr[0] != 0 || indptr[rows] != values.len() {
            return Err(Error::InvalidArgument(
                "row pointers must start with 0 and end with number of values".into(),
            ));
        }

        for row in 0..rows {
            let (start, end) = (indptr[row], indptr[row + 1]);
            if start > end || end > indices.len() {
                return Err(Error::InvalidArgument(format!(
                    "row pointers are not monotonic at row {row}"
                )));
            }
            let row_indices = &indices[start..end];
            if row_indices.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::InvalidArgument(format!(
                    "column indices of row {row} are not strictly increasing"
                )));
            }
            if row_indices.last().is_some_and(|&c| c >= cols) {
                return Err(Error::InvalidArgument(format!(
                    "column index out of range in row {row}"
                )));
            }
        }

        Ok(Self {
            rows,
            cols,
            indptr,
            indices,
            values,
        })
    }

    /// Build from unordered `(row, col, value)` triplets
    ///
    /// Duplicate coordinates are summed and explicit zeros are dropped.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self> {
        if let Some(&(r, c, _)) = triplets.iter().find(|(r, c, _)| *r >= rows || *c >= cols) {
            return Err(Error::InvalidArgument(format!(
                "entry ({r}, {c}) outside a {rows}x{cols} matrix"
            )));
        }

        triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0; rows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in triplets {
            if last == Some((r, c)) {
                if let Some(prev) = values.last_mut() {
                    *prev += v;
                }
                continue;
            }
            indices.push(c);
            values.push(v);
            indptr[r + 1] += 1;
            last = Some((r, c));
        }

        for row in 0..rows {
            indptr[row + 1] += indptr[row];
        }

        Ok(Self {
            rows,
            cols,
            indptr,
            indices,
            values,
        }
        .pruned())
    }

    /// Assemble from per-row entry lists already sorted by column
    pub(crate) fn from_sorted_rows(cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        let nnz = rows.iter().map(Vec::len).sum();
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        indptr.push(0);
        for row in &rows {
            for &(c, v) in row {
                if v != 0.0 {
                    indices.push(c);
                    values.push(v);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            rows: rows.len(),
            cols,
            indptr,
            indices,
            values,
        }
    }

    /// Convert a dense matrix, keeping only non-zero entries
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (rows, cols) = dense.dim();
        let entries = dense
            .outer_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|&(_, &v)| v != 0.0)
                    .map(|(c, &v)| (c, v))
                    .collect()
            })
            .collect();
        let mut matrix = Self::from_sorted_rows(cols, entries);
        matrix.rows = rows;
        matrix
    }

    fn pruned(self) -> Self {
        if self.values.iter().all(|&v| v != 0.0) {
            return self;
        }
        let rows = (0..self.rows)
            .map(|r| self.row(r).collect())
            .collect();
        Self::from_sorted_rows(self.cols, rows)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored non-zero values
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Fraction of non-zero entries
    pub fn density(&self) -> f64 {
        let total = self.rows as f64 * self.cols as f64;
        if total == 0.0 {
            0.0
        } else {
            self.nnz() as f64 / total
        }
    }

    /// Row pointers
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    /// Column indices
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Stored values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(column, value)` pairs of one row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (start, end) = (self.indptr[row], self.indptr[row + 1]);
        self.indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    /// Value at `(row, col)`, zero when not stored
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (start, end) = (self.indptr[row], self.indptr[row + 1]);
        self.indices[start..end]
            .binary_search(&col)
            .map_or(0.0, |i| self.values[start + i])
    }

    /// Sum of all entries
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Apply `f` to every stored value, dropping results that become zero
    #[must_use]
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        let rows = (0..self.rows)
            .map(|r| self.row(r).map(|(c, v)| (c, f(v))).collect())
            .collect();
        let mut mapped = Self::from_sorted_rows(self.cols, rows);
        mapped.rows = self.rows;
        mapped
    }

    /// Transpose into a new CSR matrix
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.cols + 1];
        for &c in &self.indices {
            counts[c + 1] += 1;
        }
        for c in 0..self.cols {
            counts[c + 1] += counts[c];
        }

        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0; self.nnz()];
        let mut values = vec![0.0; self.nnz()];

        for r in 0..self.rows {
            for (c, v) in self.row(r) {
                let slot = next[c];
                indices[slot] = r;
                values[slot] = v;
                next[c] += 1;
            }
        }

        Self {
            rows: self.cols,
            cols: self.rows,
            indptr,
            indices,
            values,
        }
    }

    /// Materialize as a dense matrix
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows, self.cols));
        for r in 0..self.rows {
            for (c, v) in self.row(r) {
                dense[[r, c]] = v;
            }
        }
        dense
    }
}

impl fmt::Debug for CsrMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CsrMatrix {{ shape: {}x{}, nnz: {} }}",
            self.rows,
            self.cols,
            self.nnz()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_triplets_sums_duplicates_and_drops_zeros() {
        let m = CsrMatrix::from_triplets(
            2,
            3,
            vec![(1, 2, 1.0), (0, 1, 2.0), (1, 2, 0.5), (0, 0, 1.0), (0, 0, -1.0)],
        )
        .unwrap();

        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 2), 1.5);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn test_from_triplets_rejects_out_of_range() {
        assert!(CsrMatrix::from_triplets(2, 2, vec![(2, 0, 1.0)]).is_err());
    }

    #[test]
    fn test_from_csr_validates_layout() {
        assert!(matches!(
            CsrMatrix::from_csr(2, 2, vec![0, 1], vec![0], vec![1.0]),
            Err(Error::Shape(_))
        ));
        assert!(CsrMatrix::from_csr(1, 2, vec![0, 2], vec![1, 0], vec![1.0, 1.0]).is_err());
        assert!(CsrMatrix::from_csr(1, 2, vec![0, 2], vec![0, 1], vec![1.0, 1.0]).is_ok());
    }

    #[test]
    fn test_from_csr_rejects_explicit_zeros() {
        let result = CsrMatrix::from_csr(2, 2, vec![0, 1, 2], vec![0, 1], vec![3.0, 0.0]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let m = CsrMatrix::from_csr(2, 2, vec![0, 1, 2], vec![0, 1], vec![3.0, -0.5]).unwrap();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 1), -0.5);
    }

    #[test]
    fn test_dense_round_trip_and_transpose() {
        let dense = array![[0.0, 2.0, 0.0], [3.0, 0.0, 4.0]];
        let m = CsrMatrix::from_dense(&dense);

        assert_eq!(m.nnz(), 3);
        assert_eq!(m.to_dense(), dense);
        assert_eq!(m.transpose().to_dense(), dense.t().to_owned());
        assert!((m.density() - 0.5).abs() < 1e-12);
        assert_eq!(m.sum(), 9.0);
    }

    #[test]
    fn test_map_values_prunes_new_zeros() {
        let m = CsrMatrix::from_dense(&array![[-1.0, 2.0], [0.0, -3.0]]);
        let relu = m.map_values(|v| v.max(0.0));
        assert_eq!(relu.nnz(), 1);
        assert_eq!(relu.shape(), (2, 2));
    }
}
