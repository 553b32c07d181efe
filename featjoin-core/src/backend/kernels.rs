//! Row-parallel kernels shared by the pooled backends
//!
//! Every function here must be called from inside the backend's thread pool;
//! rayon iterators pick up whichever pool is installed.

use ndarray::{s, Array2, Zip};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;

/// Turn a row-major buffer into an array
fn assemble(rows: usize, cols: usize, data: Vec<f64>) -> Result<Array2<f64>> {
    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Shape(e.to_string()))
}

/// Fill a `rows x cols` row-major buffer, one output row per task
fn par_rows<F>(rows: usize, cols: usize, fill: F) -> Result<Array2<f64>>
where
    F: Fn(usize, &mut [f64]) + Sync + Send,
{
    let mut out = vec![0.0; rows * cols];
    if cols > 0 {
        out.par_chunks_mut(cols)
            .enumerate()
            .for_each(|(i, row)| fill(i, row));
    }
    assemble(rows, cols, out)
}

/// Dense product through `ndarray::dot`, one row block per task
pub(crate) fn blocked_dot(a: &Array2<f64>, b: &Array2<f64>, threads: usize) -> Result<Array2<f64>> {
    let (m, n) = (a.nrows(), b.ncols());
    let block = m.div_ceil(threads * 4).max(1);

    let mut out = vec![0.0; m * n];
    if n > 0 {
        out.par_chunks_mut(block * n)
            .enumerate()
            .for_each(|(bi, chunk)| {
                let start = bi * block;
                let rows = chunk.len() / n;
                let part = a.slice(s![start..start + rows, ..]).dot(b);
                for (dst, src) in chunk.iter_mut().zip(part.iter()) {
                    *dst = *src;
                }
            });
    }
    assemble(m, n, out)
}

/// Dense product with a plain i-k-j loop per output row
pub(crate) fn ikj_dot(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    par_rows(a.nrows(), b.ncols(), |i, row| {
        for (k, &aik) in a.row(i).iter().enumerate() {
            if aik == 0.0 {
                continue;
            }
            for (dst, &bkj) in row.iter_mut().zip(b.row(k).iter()) {
                *dst += aik * bkj;
            }
        }
    })
}

/// Sparse times dense
pub(crate) fn csr_dense(a: &CsrMatrix, b: &Array2<f64>) -> Result<Array2<f64>> {
    par_rows(a.rows(), b.ncols(), |i, row| {
        for (k, aik) in a.row(i) {
            for (dst, &bkj) in row.iter_mut().zip(b.row(k).iter()) {
                *dst += aik * bkj;
            }
        }
    })
}

/// Dense times sparse
pub(crate) fn dense_csr(a: &Array2<f64>, b: &CsrMatrix) -> Result<Array2<f64>> {
    par_rows(a.nrows(), b.cols(), |i, row| {
        for (k, &aik) in a.row(i).iter().enumerate() {
            if aik == 0.0 {
                continue;
            }
            for (j, bkj) in b.row(k) {
                row[j] += aik * bkj;
            }
        }
    })
}

/// Sparse times sparse, row by row with a dense accumulator (Gustavson)
pub(crate) fn csr_csr(a: &CsrMatrix, b: &CsrMatrix) -> CsrMatrix {
    let cols = b.cols();
    let rows: Vec<Vec<(usize, f64)>> = (0..a.rows())
        .into_par_iter()
        .map_init(
            || (vec![0.0; cols], vec![false; cols], Vec::new()),
            |(acc, seen, touched), i| {
                for (k, aik) in a.row(i) {
                    for (j, bkj) in b.row(k) {
                        if !seen[j] {
                            seen[j] = true;
                            touched.push(j);
                        }
                        acc[j] += aik * bkj;
                    }
                }
                touched.sort_unstable();
                let row = touched.iter().map(|&j| (j, acc[j])).collect();
                for &j in touched.iter() {
                    acc[j] = 0.0;
                    seen[j] = false;
                }
                touched.clear();
                row
            },
        )
        .collect();
    CsrMatrix::from_sorted_rows(cols, rows)
}

/// Elementwise product of two dense arrays
pub(crate) fn dense_hadamard(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a).and(b).par_map_collect(|&x, &y| x * y)
}

/// Elementwise product of a sparse and a dense matrix
pub(crate) fn csr_dense_hadamard(a: &CsrMatrix, b: &Array2<f64>) -> CsrMatrix {
    let rows = (0..a.rows())
        .into_par_iter()
        .map(|i| a.row(i).map(|(j, v)| (j, v * b[[i, j]])).collect())
        .collect();
    CsrMatrix::from_sorted_rows(a.cols(), rows)
}

/// Elementwise product of two sparse matrices, intersecting sorted rows
pub(crate) fn csr_csr_hadamard(a: &CsrMatrix, b: &CsrMatrix) -> CsrMatrix {
    let rows = (0..a.rows())
        .into_par_iter()
        .map(|i| {
            let mut left = a.row(i).peekable();
            let mut right = b.row(i).peekable();
            let mut row = Vec::new();
            while let (Some(&(lc, lv)), Some(&(rc, rv))) = (left.peek(), right.peek()) {
                match lc.cmp(&rc) {
                    std::cmp::Ordering::Less => {
                        left.next();
                    }
                    std::cmp::Ordering::Greater => {
                        right.next();
                    }
                    std::cmp::Ordering::Equal => {
                        row.push((lc, lv * rv));
                        left.next();
                        right.next();
                    }
                }
            }
            row
        })
        .collect();
    CsrMatrix::from_sorted_rows(a.cols(), rows)
}

/// Apply `f` to every element of a dense array
pub(crate) fn dense_map<F>(a: &Array2<f64>, f: F) -> Array2<f64>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    Zip::from(a).par_map_collect(|&x| f(x))
}

/// Standard logistic function
pub(crate) fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dense_kernels_agree() {
        let a = array![[1.0, 2.0, 0.0], [0.0, 1.0, 3.0]];
        let b = array![[1.0, 0.0], [2.0, 1.0], [0.0, 4.0]];
        let expected = a.dot(&b);

        assert_eq!(blocked_dot(&a, &b, 3).unwrap(), expected);
        assert_eq!(ikj_dot(&a, &b).unwrap(), expected);
        assert_eq!(csr_dense(&CsrMatrix::from_dense(&a), &b).unwrap(), expected);
        assert_eq!(dense_csr(&a, &CsrMatrix::from_dense(&b)).unwrap(), expected);
        assert_eq!(
            csr_csr(&CsrMatrix::from_dense(&a), &CsrMatrix::from_dense(&b)).to_dense(),
            expected
        );
    }

    #[test]
    fn test_gustavson_drops_cancelled_entries() {
        let a = CsrMatrix::from_dense(&array![[1.0, 1.0]]);
        let b = CsrMatrix::from_dense(&array![[1.0], [-1.0]]);
        let product = csr_csr(&a, &b);
        assert_eq!(product.shape(), (1, 1));
        assert_eq!(product.nnz(), 0);
    }

    #[test]
    fn test_sparse_hadamard_intersects() {
        let a = CsrMatrix::from_dense(&array![[1.0, 0.0, 2.0], [0.0, 3.0, 0.0]]);
        let b = CsrMatrix::from_dense(&array![[5.0, 1.0, 0.0], [0.0, 2.0, 7.0]]);
        let product = csr_csr_hadamard(&a, &b);
        assert_eq!(product.to_dense(), array![[5.0, 0.0, 0.0], [0.0, 6.0, 0.0]]);
        assert_eq!(product.nnz(), 2);
    }

    #[test]
    fn test_empty_dimensions() {
        let a = Array2::<f64>::zeros((3, 0));
        let b = Array2::<f64>::zeros((0, 2));
        assert_eq!(ikj_dot(&a, &b).unwrap(), Array2::<f64>::zeros((3, 2)));
        assert_eq!(blocked_dot(&b.t().to_owned(), &a.t().to_owned(), 2).unwrap().dim(), (2, 3));
    }
}
