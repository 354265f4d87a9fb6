//! Kernel functions and the reduced eigenbasis transformation
//!
//! Nonlinear GenSVM works on a spectral factorization of the kernel matrix:
//! `K = P diag(sigma^2) P'` with only the numerically relevant eigenpairs
//! retained. Training then proceeds as a linear problem on the factor
//! `[1 | P diag(sigma)]`, and test data is projected into the same basis
//! through the cross-kernel with the training instances.

use crate::data::{Dataset, KernelBasis};
use crate::error::{GenSvmError, Result};
use crate::matrix::DesignMatrix;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Iteration cap handed to the symmetric eigensolver
const EIGEN_MAX_ITER: usize = 100_000;

/// Kernel function used to compare two instances
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    /// Plain inner product; training operates directly on the input features
    Linear,
    /// `k(x, z) = exp(-gamma * ||x - z||^2)`
    Rbf { gamma: f64 },
    /// `k(x, z) = (gamma * <x, z> + coef)^degree`
    Poly { gamma: f64, coef: f64, degree: i32 },
    /// `k(x, z) = tanh(gamma * <x, z> + coef)`
    Sigmoid { gamma: f64, coef: f64 },
}

impl Kernel {
    pub fn is_linear(&self) -> bool {
        matches!(self, Kernel::Linear)
    }

    /// Evaluate the kernel between row `i` of `a` and row `j` of `b`
    ///
    /// Both matrices are augmented, so the bias column is skipped.
    fn eval(&self, a: &DMatrix<f64>, i: usize, b: &DMatrix<f64>, j: usize) -> f64 {
        let m = a.ncols() - 1;
        match *self {
            Kernel::Linear => {
                let mut dot = 0.0;
                for c in 1..=m {
                    dot += a[(i, c)] * b[(j, c)];
                }
                dot
            }
            Kernel::Rbf { gamma } => {
                let mut dist = 0.0;
                for c in 1..=m {
                    let d = a[(i, c)] - b[(j, c)];
                    dist += d * d;
                }
                (-gamma * dist).exp()
            }
            Kernel::Poly { gamma, coef, degree } => {
                let mut dot = 0.0;
                for c in 1..=m {
                    dot += a[(i, c)] * b[(j, c)];
                }
                (gamma * dot + coef).powi(degree)
            }
            Kernel::Sigmoid { gamma, coef } => {
                let mut dot = 0.0;
                for c in 1..=m {
                    dot += a[(i, c)] * b[(j, c)];
                }
                (gamma * dot + coef).tanh()
            }
        }
    }
}

/// Transform training data into the reduced eigenbasis
///
/// For a linear kernel this only records `r = m`. Otherwise the Gram matrix
/// is built from the raw features, decomposed, truncated at
/// `eigen_cutoff` relative to the largest eigenvalue, and the dataset is
/// rewritten as `Z = [1 | P diag(sigma)]` with `sigma` the square roots of
/// the retained eigenvalues. The raw matrix, `sigma`, and the kernel are
/// kept on the dataset for test-time projection.
pub fn preprocess(kernel: Kernel, eigen_cutoff: f64, data: &mut Dataset) -> Result<()> {
    if kernel.is_linear() {
        data.r = data.m;
        return Ok(());
    }

    let raw = match &data.z {
        DesignMatrix::Dense(z) => z.clone(),
        _ => return Err(GenSvmError::KernelRequiresDense),
    };

    let n = data.n;
    let mut gram = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let value = kernel.eval(&raw, i, &raw, j);
            gram[(i, j)] = value;
            gram[(j, i)] = value;
        }
    }

    let (p, sigma) = reduced_eigendecomposition(gram, eigen_cutoff)?;
    let r = sigma.len();

    // Z = [1 | P diag(sigma)]
    let mut z = DMatrix::zeros(n, r + 1);
    for i in 0..n {
        z[(i, 0)] = 1.0;
        for j in 0..r {
            z[(i, j + 1)] = p[(i, j)] * sigma[j];
        }
    }

    data.z = DesignMatrix::Dense(z);
    data.r = r;
    data.kernel_basis = Some(KernelBasis { raw, sigma, kernel });

    log::debug!("kernel preprocessing retained {} of {} eigenvalues", r, n);
    Ok(())
}

/// Project test data into the eigenbasis of the training data
///
/// Computes the cross-kernel `K2` between test and training instances and
/// forms `N = K2 * M * diag(sigma)^-2`, where `M` is the training factor
/// without its bias column. The test dataset is rewritten as `[1 | N]`.
pub fn postprocess(kernel: Kernel, train: &Dataset, test: &mut Dataset) -> Result<()> {
    if kernel.is_linear() {
        test.r = test.m;
        return Ok(());
    }

    let basis = train.kernel_basis.as_ref().ok_or_else(|| {
        GenSvmError::DimensionMismatch(
            "training data has not been kernel-preprocessed".to_string(),
        )
    })?;
    let train_z = match &train.z {
        DesignMatrix::Dense(z) => z,
        _ => return Err(GenSvmError::KernelRequiresDense),
    };
    let test_raw = match &test.z {
        DesignMatrix::Dense(z) => z.clone(),
        _ => return Err(GenSvmError::KernelRequiresDense),
    };
    if test.m != train.m {
        return Err(GenSvmError::DimensionMismatch(format!(
            "train data has {} features, test data has {}",
            train.m, test.m
        )));
    }

    let n1 = train.n;
    let n2 = test.n;
    let r = train.r;

    let mut k2 = DMatrix::zeros(n2, n1);
    for i in 0..n2 {
        for j in 0..n1 {
            k2[(i, j)] = kernel.eval(&test_raw, i, &basis.raw, j);
        }
    }

    // M is the training factor without the bias column
    let m_factor = train_z.columns(1, r).clone_owned();
    let mut n_factor = &k2 * m_factor;
    for j in 0..r {
        let scale = basis.sigma[j].powi(-2);
        for i in 0..n2 {
            n_factor[(i, j)] *= scale;
        }
    }

    let mut z = DMatrix::zeros(n2, r + 1);
    for i in 0..n2 {
        z[(i, 0)] = 1.0;
        for j in 0..r {
            z[(i, j + 1)] = n_factor[(i, j)];
        }
    }

    test.z = DesignMatrix::Dense(z);
    test.r = r;
    test.kernel_basis = Some(KernelBasis {
        raw: test_raw,
        sigma: basis.sigma.clone(),
        kernel,
    });

    Ok(())
}

/// Eigendecomposition of the Gram matrix, truncated by relative magnitude
///
/// Eigenvalues are sorted descending; pairs are kept while
/// `lambda_i / lambda_max > cutoff`. The returned `sigma` holds the square
/// roots of the retained eigenvalues, so the truncated factor reproduces the
/// Gram matrix up to the discarded directions. Eigenvector signs are
/// arbitrary and nothing downstream may depend on them.
fn reduced_eigendecomposition(
    gram: DMatrix<f64>,
    cutoff: f64,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let n = gram.nrows();
    let eigen = SymmetricEigen::try_new(gram, f64::EPSILON, EIGEN_MAX_ITER)
        .ok_or(GenSvmError::EigenDecompositionFailed)?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let lambda_max = eigen.eigenvalues[order[0]];
    let mut rank = 0;
    for &idx in &order {
        if eigen.eigenvalues[idx] / lambda_max <= cutoff {
            break;
        }
        rank += 1;
    }

    let mut p = DMatrix::zeros(n, rank);
    let mut sigma = DVector::zeros(rank);
    for (col, &idx) in order[..rank].iter().enumerate() {
        sigma[col] = eigen.eigenvalues[idx].sqrt();
        for row in 0..n {
            p[(row, col)] = eigen.eigenvectors[(row, idx)];
        }
    }

    Ok((p, sigma))
}
