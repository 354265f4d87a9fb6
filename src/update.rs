//! Majorization coefficients and the weight update step
//!
//! Every iteration majorizes the loss at the current iterate by a quadratic,
//! whose minimizer is found by solving the normal equations
//!
//! ```text
//! (Z'AZ + lambda J) V_new = Z'AZ V_old + Z'B
//! ```
//!
//! with `A = diag(alpha)` and `B` the matrix of per-instance linear
//! coefficient rows. The coefficient expressions come from the GenSVM
//! majorization derivation and must be reproduced exactly: convergence
//! relies on the quadratic lying above the loss everywhere and touching it
//! at the current iterate.

use crate::data::Dataset;
use crate::error::Result;
use crate::matrix::{solve_sym_system, DesignMatrix};
use crate::model::SvmModel;
use crate::optimize::Workspace;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Number of instance rows folded into one partial sum of the sparse `Z'AZ`
/// accumulation. Blockwise summation limits rounding drift on large
/// datasets and keeps the result reproducible for a fixed CSR layout.
const ZAZ_BLOCK_SIZE: usize = 512;

/// Compute `omega_i` for an instance in the non-simple case
///
/// `omega_i = (1/p) * (sum_{j != y_i} H[i,j]^p)^(1/p - 1)`, using the
/// precomputed Huber errors.
pub fn calculate_omega(model: &SvmModel, y: &[usize], i: usize) -> f64 {
    let p = model.p;
    let yi = y[i] - 1;
    let mut sum = 0.0;
    for j in 0..model.k {
        if j == yi {
            continue;
        }
        sum += model.h[(i, j)].powf(p);
    }
    (1.0 / p) * sum.powf(1.0 / p - 1.0)
}

/// Check whether the simple majorization applies to an instance
///
/// Simple majorization is possible when at most one of the Huber errors of
/// the instance is strictly positive.
pub fn majorize_is_simple(model: &SvmModel, y: &[usize], i: usize) -> bool {
    let yi = y[i] - 1;
    let mut positive = 0;
    for j in 0..model.k {
        if j == yi {
            continue;
        }
        if model.h[(i, j)] > 0.0 {
            positive += 1;
            if positive > 1 {
                return false;
            }
        }
    }
    true
}

/// Majorization coefficients `(a, b - a*q)` for the simple case
///
/// Equivalent to the general coefficients at `p = 1`; the linear
/// coefficient is returned with the `a*q` term already subtracted.
pub fn simple_coefficients(q: f64, kappa: f64) -> (f64, f64) {
    if q <= -kappa {
        let a = 0.25 / (0.5 - kappa / 2.0 - q);
        (a, 0.5)
    } else if q <= 1.0 {
        let a = 1.0 / (2.0 * kappa + 2.0);
        (a, (1.0 - q) * a)
    } else {
        let a = -0.25 / (0.5 - kappa / 2.0 - q);
        (a, 0.0)
    }
}

/// Majorization coefficients `(a, b - a*q)` for the non-simple case
///
/// For `p` within 0.01 of 2 the closed-form Huber majorizer is used.
/// Otherwise the general Lp majorizer applies, with the extra case boundary
/// at `(p + kappa - 1) / (p - 2)`.
pub fn non_simple_coefficients(q: f64, p: f64, kappa: f64) -> (f64, f64) {
    let a;
    let mut b_aq = 0.0;

    if 2.0 - p < 1e-2 {
        if q <= -kappa {
            b_aq = 0.5 - kappa / 2.0 - q;
        } else if q <= 1.0 {
            b_aq = (1.0 - q).powi(3) / (2.0 * (kappa + 1.0).powi(2));
        }
        a = 1.5;
    } else {
        if q <= (p + kappa - 1.0) / (p - 2.0) {
            a = 0.25 * p.powi(2) * (0.5 - kappa / 2.0 - q).powf(p - 2.0);
        } else if q <= 1.0 {
            a = 0.25 * p * (2.0 * p - 1.0) * ((kappa + 1.0) / 2.0).powf(p - 2.0);
        } else {
            a = 0.25 * p.powi(2) * ((p / (p - 2.0)) * (0.5 - kappa / 2.0 - q)).powf(p - 2.0);
            b_aq = a * (2.0 * q + kappa - 1.0) / (p - 2.0)
                + 0.5 * p * (p / (p - 2.0) * (0.5 - kappa / 2.0 - q)).powf(p - 1.0);
        }
        if q <= -kappa {
            b_aq = 0.5 * p * (0.5 - kappa / 2.0 - q).powf(p - 1.0);
        } else if q <= 1.0 {
            b_aq = p * (1.0 - q).powf(2.0 * p - 1.0) / (2.0 * kappa + 2.0).powf(p);
        }
    }

    (a, b_aq)
}

/// Compute `alpha_i` and accumulate the `beta_i` row for one instance
///
/// `beta` is cleared and filled with the weighted sum of simplex difference
/// rows; the returned value is the diagonal entry of `A` for this instance.
pub fn alpha_beta(model: &SvmModel, y: &[usize], i: usize, beta: &mut DVector<f64>) -> f64 {
    let k = model.k;
    let inv_n = 1.0 / model.n as f64;
    let yi = y[i] - 1;

    let simple = majorize_is_simple(model, y, i);
    let omega = if simple {
        1.0
    } else {
        calculate_omega(model, y, i)
    };

    beta.fill(0.0);
    let mut alpha = 0.0;
    for j in 0..k {
        if j == yi {
            continue;
        }
        let q = model.q[(i, j)];
        let (a, mut b_aq) = if simple {
            simple_coefficients(q, model.kappa)
        } else {
            non_simple_coefficients(q, model.p, model.kappa)
        };

        b_aq *= model.rho[i] * omega * inv_n;
        let row = yi * k + j;
        for c in 0..k - 1 {
            beta[c] += b_aq * model.uu[(row, c)];
        }

        alpha += a;
    }
    alpha * omega * model.rho[i] * inv_n
}

/// Accumulate `Z'AZ` and `Z'B` over all instances
///
/// Dispatches on the storage of `Z`; the workspace buffers are cleared
/// first and hold the results on return, with `zaz` fully symmetric.
pub fn get_zaz_zb(model: &SvmModel, data: &Dataset, y: &[usize], work: &mut Workspace) {
    work.reset();
    match &data.z {
        DesignMatrix::Dense(z) => get_zaz_zb_dense(model, z, y, work),
        DesignMatrix::Sparse(z) => get_zaz_zb_sparse(model, z, y, work),
        DesignMatrix::SparseCsc(z) => get_zaz_zb_sparse_csc(model, z, y, work),
    }
}

/// Dense accumulation of `Z'AZ` and `Z'B`
///
/// Builds `LZ` with rows `sqrt(alpha_i) * z_i'` and forms `Z'AZ = LZ'LZ` in
/// one symmetric product; `Z'B` grows by a rank-1 update per instance. The
/// first column of `Z` is identically 1, so its scaled entry is written
/// directly.
fn get_zaz_zb_dense(model: &SvmModel, z: &DMatrix<f64>, y: &[usize], work: &mut Workspace) {
    let m = model.m;

    for i in 0..model.n {
        let alpha = alpha_beta(model, y, i, &mut work.beta);
        let sqalpha = alpha.sqrt();

        work.lz[(i, 0)] = sqalpha;
        for j in 1..=m {
            work.lz[(i, j)] = sqalpha * z[(i, j)];
        }

        let zi = z.row(i).transpose();
        work.zb.ger(1.0, &zi, &work.beta, 1.0);
    }

    work.zaz.gemm_tr(1.0, &work.lz, &work.lz, 0.0);
}

/// Sparse (CSR) accumulation of `Z'AZ` and `Z'B`
///
/// Rows are processed in fixed-size blocks; each block accumulates the
/// upper triangle of its partial `Z'AZ` locally before folding it into the
/// global result. Nonzeros are visited in stored order.
fn get_zaz_zb_sparse(model: &SvmModel, z: &CsrMatrix<f64>, y: &[usize], work: &mut Workspace) {
    let offsets = z.row_offsets();
    let cols = z.col_indices();
    let vals = z.values();
    let n_row = z.nrows();
    let n_col = z.ncols();
    let kc = model.k - 1;

    let n_blocks = n_row / ZAZ_BLOCK_SIZE;
    let rem_size = n_row % ZAZ_BLOCK_SIZE;

    for blk in 0..=n_blocks {
        let blk_start = blk * ZAZ_BLOCK_SIZE;
        let blk_end = blk_start + if blk == n_blocks { rem_size } else { ZAZ_BLOCK_SIZE };

        work.tmp_zaz.fill(0.0);
        for i in blk_start..blk_end {
            let alpha = alpha_beta(model, y, i, &mut work.beta);

            for idx in offsets[i]..offsets[i + 1] {
                let j = cols[idx];
                let z_ij = vals[idx];

                for c in 0..kc {
                    work.zb[(j, c)] += z_ij * work.beta[c];
                }

                let za = z_ij * alpha;
                for idx2 in idx..offsets[i + 1] {
                    work.tmp_zaz[(j, cols[idx2])] += za * vals[idx2];
                }
            }
        }

        for a in 0..n_col {
            for b in a..n_col {
                work.zaz[(a, b)] += work.tmp_zaz[(a, b)];
            }
        }
    }

    // only the upper triangle was maintained
    for a in 0..n_col {
        for b in a + 1..n_col {
            work.zaz[(b, a)] = work.zaz[(a, b)];
        }
    }
}

/// CSC accumulation of `Z'AZ` and `Z'B`
///
/// The transposed traversal cannot interleave the coefficient computation
/// with the matrix products, so all `alpha_i` and `beta_i` rows are computed
/// up front. Entry `(k, l)` of `Z'AZ` then collects the products of matching
/// row indices between columns `k` and `l`.
fn get_zaz_zb_sparse_csc(model: &SvmModel, z: &CscMatrix<f64>, y: &[usize], work: &mut Workspace) {
    let offsets = z.col_offsets();
    let rows = z.row_indices();
    let vals = z.values();
    let n_col = z.ncols();
    let kc = model.k - 1;

    for i in 0..model.n {
        work.a_diag[i] = alpha_beta(model, y, i, &mut work.beta);
        for c in 0..kc {
            work.b_rows[(i, c)] = work.beta[c];
        }
    }

    for k_col in 0..n_col {
        for aa in offsets[k_col]..offsets[k_col + 1] {
            let i = rows[aa];
            let z_ik = vals[aa];
            let alpha = work.a_diag[i];

            // the result is symmetric, only columns from k_col onwards
            for l in k_col..n_col {
                for bb in offsets[l]..offsets[l + 1] {
                    if rows[bb] != i {
                        continue;
                    }
                    work.zaz[(k_col, l)] += alpha * z_ik * vals[bb];
                }
            }

            for c in 0..kc {
                work.zb[(k_col, c)] += z_ik * work.b_rows[(i, c)];
            }
        }
    }

    for a in 0..n_col {
        for b in a + 1..n_col {
            work.zaz[(b, a)] = work.zaz[(a, b)];
        }
    }
}

/// Perform a single majorization step, replacing `V` by the new iterate
///
/// Assumes `Q` and `H` are up to date with the current `V` (they are
/// recomputed by the loss evaluation that precedes every update). On return
/// `vbar` holds the previous iterate. When even the indefinite fallback
/// cannot solve the system, `V` is left untouched and an error is returned.
pub fn update(model: &mut SvmModel, data: &Dataset, y: &[usize], work: &mut Workspace) -> Result<()> {
    get_zaz_zb(model, data, y, work);

    // right-hand side: Z'AZ V_old + Z'B, stored in zb
    work.zb.gemm(1.0, &work.zaz, &model.v, 1.0);

    // ridge on everything except the intercept row
    for i in 1..=model.m {
        work.zaz[(i, i)] += model.lambda;
    }

    let solution = solve_sym_system(&work.zaz, &work.zb)?;

    model.vbar.copy_from(&model.v);
    model.v.copy_from(&solution);
    Ok(())
}
