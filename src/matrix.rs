//! Matrix storage and linear-algebra primitives for GenSVM
//!
//! The optimizer only ever needs three things from the data matrix: its
//! dimensions, the product with a dense weight matrix, and row-wise access to
//! the nonzero entries. Both storage schemes are kept behind a single enum so
//! the rest of the crate never branches on representation at call sites.

use crate::error::{GenSvmError, Result};
use nalgebra::{Cholesky, DMatrix, LU};
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Augmented data matrix `Z = [1 | X]`, stored dense, as CSR, or as CSC
#[derive(Debug, Clone)]
pub enum DesignMatrix {
    Dense(DMatrix<f64>),
    Sparse(CsrMatrix<f64>),
    SparseCsc(CscMatrix<f64>),
}

impl DesignMatrix {
    /// Number of rows (instances)
    pub fn n_rows(&self) -> usize {
        match self {
            DesignMatrix::Dense(z) => z.nrows(),
            DesignMatrix::Sparse(z) => z.nrows(),
            DesignMatrix::SparseCsc(z) => z.nrows(),
        }
    }

    /// Number of columns (features plus the bias column)
    pub fn n_cols(&self) -> usize {
        match self {
            DesignMatrix::Dense(z) => z.ncols(),
            DesignMatrix::Sparse(z) => z.ncols(),
            DesignMatrix::SparseCsc(z) => z.ncols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        !matches!(self, DesignMatrix::Dense(_))
    }

    /// Dense view of the matrix, materializing sparse storage if necessary
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            DesignMatrix::Dense(z) => z.clone(),
            DesignMatrix::Sparse(z) => {
                let mut out = DMatrix::zeros(z.nrows(), z.ncols());
                let offsets = z.row_offsets();
                let cols = z.col_indices();
                let vals = z.values();
                for i in 0..z.nrows() {
                    for idx in offsets[i]..offsets[i + 1] {
                        out[(i, cols[idx])] = vals[idx];
                    }
                }
                out
            }
            DesignMatrix::SparseCsc(z) => {
                let mut out = DMatrix::zeros(z.nrows(), z.ncols());
                let offsets = z.col_offsets();
                let rows = z.row_indices();
                let vals = z.values();
                for j in 0..z.ncols() {
                    for idx in offsets[j]..offsets[j + 1] {
                        out[(rows[idx], j)] = vals[idx];
                    }
                }
                out
            }
        }
    }

    /// Compute the product `Z * V` with a dense matrix `V`
    ///
    /// The sparse path walks the stored nonzeros row by row, so the result is
    /// reproducible for a fixed CSR layout.
    pub fn multiply(&self, v: &DMatrix<f64>) -> DMatrix<f64> {
        let mut zv = DMatrix::zeros(self.n_rows(), v.ncols());
        self.multiply_into(v, &mut zv);
        zv
    }

    /// As [`DesignMatrix::multiply`], writing into a preallocated buffer
    pub fn multiply_into(&self, v: &DMatrix<f64>, zv: &mut DMatrix<f64>) {
        match self {
            DesignMatrix::Dense(z) => zv.gemm(1.0, z, v, 0.0),
            DesignMatrix::Sparse(z) => {
                zv.fill(0.0);
                let offsets = z.row_offsets();
                let cols = z.col_indices();
                let vals = z.values();
                for i in 0..z.nrows() {
                    for idx in offsets[i]..offsets[i + 1] {
                        let j = cols[idx];
                        let z_ij = vals[idx];
                        for c in 0..v.ncols() {
                            zv[(i, c)] += z_ij * v[(j, c)];
                        }
                    }
                }
            }
            DesignMatrix::SparseCsc(z) => {
                zv.fill(0.0);
                let offsets = z.col_offsets();
                let rows = z.row_indices();
                let vals = z.values();
                for j in 0..z.ncols() {
                    for idx in offsets[j]..offsets[j + 1] {
                        let i = rows[idx];
                        let z_ij = vals[idx];
                        for c in 0..v.ncols() {
                            zv[(i, c)] += z_ij * v[(j, c)];
                        }
                    }
                }
            }
        }
    }

    /// Smallest and largest entry of column `j`, implicit zeros included
    pub fn column_extent(&self, j: usize) -> (f64, f64) {
        match self {
            DesignMatrix::Dense(z) => {
                let col = z.column(j);
                let mut cmin = f64::INFINITY;
                let mut cmax = f64::NEG_INFINITY;
                for &v in col.iter() {
                    cmin = cmin.min(v);
                    cmax = cmax.max(v);
                }
                (cmin, cmax)
            }
            DesignMatrix::Sparse(z) => {
                let mut cmin = f64::INFINITY;
                let mut cmax = f64::NEG_INFINITY;
                let mut stored = 0usize;
                for (&c, &v) in z.col_indices().iter().zip(z.values().iter()) {
                    if c == j {
                        cmin = cmin.min(v);
                        cmax = cmax.max(v);
                        stored += 1;
                    }
                }
                if stored < z.nrows() {
                    cmin = cmin.min(0.0);
                    cmax = cmax.max(0.0);
                }
                (cmin, cmax)
            }
            DesignMatrix::SparseCsc(z) => {
                let offsets = z.col_offsets();
                let vals = z.values();
                let mut cmin = f64::INFINITY;
                let mut cmax = f64::NEG_INFINITY;
                for idx in offsets[j]..offsets[j + 1] {
                    cmin = cmin.min(vals[idx]);
                    cmax = cmax.max(vals[idx]);
                }
                if offsets[j + 1] - offsets[j] < z.nrows() {
                    cmin = cmin.min(0.0);
                    cmax = cmax.max(0.0);
                }
                (cmin, cmax)
            }
        }
    }
}

/// Decide whether a dense matrix is worth storing as CSR
///
/// Sparse storage pays off roughly when at least half of the entries are
/// zero; below that the index arrays outweigh the skipped values.
pub fn could_sparse(z: &DMatrix<f64>) -> bool {
    let nnz = z.iter().filter(|&&v| v != 0.0).count();
    2 * nnz <= z.nrows() * z.ncols()
}

/// Convert a dense matrix into CSR storage, dropping exact zeros
pub fn dense_to_csr(z: &DMatrix<f64>) -> CsrMatrix<f64> {
    let n = z.nrows();
    let m = z.ncols();
    let mut row_offsets = Vec::with_capacity(n + 1);
    let mut col_indices = Vec::new();
    let mut values = Vec::new();

    row_offsets.push(0);
    for i in 0..n {
        for j in 0..m {
            let v = z[(i, j)];
            if v != 0.0 {
                col_indices.push(j);
                values.push(v);
            }
        }
        row_offsets.push(col_indices.len());
    }

    CsrMatrix::try_from_csr_data(n, m, row_offsets, col_indices, values)
        .expect("row-major scan yields a valid CSR layout")
}

/// Convert a dense matrix into CSC storage, dropping exact zeros
pub fn dense_to_csc(z: &DMatrix<f64>) -> CscMatrix<f64> {
    let n = z.nrows();
    let m = z.ncols();
    let mut col_offsets = Vec::with_capacity(m + 1);
    let mut row_indices = Vec::new();
    let mut values = Vec::new();

    col_offsets.push(0);
    for j in 0..m {
        for i in 0..n {
            let v = z[(i, j)];
            if v != 0.0 {
                row_indices.push(i);
                values.push(v);
            }
        }
        col_offsets.push(row_indices.len());
    }

    CscMatrix::try_from_csc_data(n, m, col_offsets, row_indices, values)
        .expect("column-major scan yields a valid CSC layout")
}

/// Solve `A X = B` for a symmetric matrix `A`
///
/// The system coming out of a majorization step is positive definite up to
/// rounding, so a Cholesky factorization is attempted first. When that fails
/// the same system is handed to an LU factorization with partial pivoting,
/// which also covers the indefinite case. A singular system is an error.
pub fn solve_sym_system(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if let Some(chol) = Cholesky::new(a.clone()) {
        return Ok(chol.solve(b));
    }

    log::warn!("majorization system is not positive definite, retrying with LU");
    let lu = LU::new(a.clone());
    lu.solve(b).ok_or(GenSvmError::SingularSystem)
}
