//! Dataset construction and validation
//!
//! A [`Dataset`] owns the augmented data matrix `Z = [1 | X]` in either dense
//! or CSR form, the class labels, and, after kernel preprocessing, the
//! eigenbasis needed to project test data consistently. The raw matrix and
//! the kernel factor are separate owned buffers, so no aliasing convention is
//! needed to tell the two apart.

use crate::error::{GenSvmError, Result};
use crate::kernel::Kernel;
use crate::matrix::{could_sparse, dense_to_csr, DesignMatrix};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Eigenbasis information kept after nonlinear kernel preprocessing
#[derive(Debug, Clone)]
pub struct KernelBasis {
    /// Augmented raw data matrix `[1 | X]` the kernel was computed from
    pub raw: DMatrix<f64>,
    /// Square roots of the retained eigenvalues, descending
    pub sigma: DVector<f64>,
    /// Kernel the basis was built with
    pub kernel: Kernel,
}

/// A labeled (or unlabeled) dataset in augmented representation
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Number of instances
    pub n: usize,
    /// Number of raw features
    pub m: usize,
    /// Effective feature count: `m` for linear, retained eigenrank otherwise
    pub r: usize,
    /// Number of classes, 0 when the dataset carries no labels
    pub k: usize,
    /// Class labels in `1..=k`
    pub y: Option<Vec<usize>>,
    /// Live augmented representation, bias column included
    pub z: DesignMatrix,
    /// Present after nonlinear kernel preprocessing
    pub kernel_basis: Option<KernelBasis>,
}

impl Dataset {
    /// Build a dataset from a dense `n x m` feature matrix
    ///
    /// The matrix is augmented with a leading column of ones. Storage
    /// switches to CSR when at least half of the raw entries are zero.
    pub fn from_dense(x: &DMatrix<f64>, y: Option<Vec<usize>>) -> Result<Self> {
        let n = x.nrows();
        let m = x.ncols();
        let k = check_labels(y.as_deref(), n)?;

        let mut z = DMatrix::zeros(n, m + 1);
        for i in 0..n {
            z[(i, 0)] = 1.0;
            for j in 0..m {
                z[(i, j + 1)] = x[(i, j)];
            }
        }

        let z = if could_sparse(x) {
            DesignMatrix::Sparse(dense_to_csr(&z))
        } else {
            DesignMatrix::Dense(z)
        };

        Ok(Dataset {
            n,
            m,
            r: m,
            k,
            y,
            z,
            kernel_basis: None,
        })
    }

    /// Build a dataset from CSR feature data
    ///
    /// The input describes the raw `n x m` feature matrix; the bias column is
    /// materialized at column 0 of the augmented matrix, so every row of the
    /// result has at least one stored entry.
    pub fn from_csr(x: &CsrMatrix<f64>, y: Option<Vec<usize>>) -> Result<Self> {
        let n = x.nrows();
        let m = x.ncols();
        let k = check_labels(y.as_deref(), n)?;

        let offsets = x.row_offsets();
        let cols = x.col_indices();
        let vals = x.values();

        let mut row_offsets = Vec::with_capacity(n + 1);
        let mut col_indices = Vec::with_capacity(x.nnz() + n);
        let mut values = Vec::with_capacity(x.nnz() + n);

        row_offsets.push(0);
        for i in 0..n {
            col_indices.push(0);
            values.push(1.0);
            for idx in offsets[i]..offsets[i + 1] {
                col_indices.push(cols[idx] + 1);
                values.push(vals[idx]);
            }
            row_offsets.push(col_indices.len());
        }

        let z = CsrMatrix::try_from_csr_data(n, m + 1, row_offsets, col_indices, values)
            .expect("augmenting a CSR matrix preserves the CSR layout");

        Ok(Dataset {
            n,
            m,
            r: m,
            k,
            y,
            z: DesignMatrix::Sparse(z),
            kernel_basis: None,
        })
    }

    /// Build a dataset from CSC feature data
    ///
    /// The column-major twin of [`Dataset::from_csr`]; the bias becomes the
    /// first column of the augmented matrix with all `n` entries stored.
    pub fn from_csc(x: &CscMatrix<f64>, y: Option<Vec<usize>>) -> Result<Self> {
        let n = x.nrows();
        let m = x.ncols();
        let k = check_labels(y.as_deref(), n)?;

        let offsets = x.col_offsets();
        let rows = x.row_indices();
        let vals = x.values();

        let mut col_offsets = Vec::with_capacity(m + 2);
        let mut row_indices = Vec::with_capacity(x.nnz() + n);
        let mut values = Vec::with_capacity(x.nnz() + n);

        col_offsets.push(0);
        row_indices.extend(0..n);
        values.extend(std::iter::repeat(1.0).take(n));
        col_offsets.push(n);
        for j in 0..m {
            for idx in offsets[j]..offsets[j + 1] {
                row_indices.push(rows[idx]);
                values.push(vals[idx]);
            }
            col_offsets.push(row_indices.len());
        }

        let z = CscMatrix::try_from_csc_data(n, m + 1, col_offsets, row_indices, values)
            .expect("augmenting a CSC matrix preserves the CSC layout");

        Ok(Dataset {
            n,
            m,
            r: m,
            k,
            y,
            z: DesignMatrix::SparseCsc(z),
            kernel_basis: None,
        })
    }

    /// Raw feature value of instance `i`, feature `j` (0-based, bias excluded)
    ///
    /// Reads from the kernel basis when one is present, since `z` then holds
    /// the eigenbasis factor rather than the original features.
    pub fn raw_feature(&self, i: usize, j: usize) -> f64 {
        match &self.kernel_basis {
            Some(basis) => basis.raw[(i, j + 1)],
            None => match &self.z {
                DesignMatrix::Dense(z) => z[(i, j + 1)],
                DesignMatrix::Sparse(z) => {
                    let offsets = z.row_offsets();
                    let cols = z.col_indices();
                    let vals = z.values();
                    for idx in offsets[i]..offsets[i + 1] {
                        if cols[idx] == j + 1 {
                            return vals[idx];
                        }
                    }
                    0.0
                }
                DesignMatrix::SparseCsc(z) => {
                    let offsets = z.col_offsets();
                    let rows = z.row_indices();
                    let vals = z.values();
                    for idx in offsets[j + 1]..offsets[j + 2] {
                        if rows[idx] == i {
                            return vals[idx];
                        }
                    }
                    0.0
                }
            },
        }
    }
}

/// Verify that labels are contiguous on `1..=K` and return `K`
///
/// Returns 0 for unlabeled data. Every class in the range must occur at
/// least once, otherwise the simplex dimensionality would not match the
/// number of observed classes.
pub fn check_labels(y: Option<&[usize]>, n: usize) -> Result<usize> {
    let y = match y {
        Some(y) => y,
        None => return Ok(0),
    };

    if y.len() != n {
        return Err(GenSvmError::DimensionMismatch(format!(
            "expected {} labels, got {}",
            n,
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(GenSvmError::InvalidLabels("empty label vector".to_string()));
    }

    let max = *y.iter().max().expect("label vector is non-empty");
    let min = *y.iter().min().expect("label vector is non-empty");
    if min < 1 {
        return Err(GenSvmError::InvalidLabels(format!(
            "labels must be positive, found {}",
            min
        )));
    }

    let mut seen = vec![false; max];
    for &label in y {
        seen[label - 1] = true;
    }
    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(GenSvmError::InvalidLabels(format!(
            "labels are not contiguous: class {} is missing",
            missing + 1
        )));
    }

    Ok(max)
}
