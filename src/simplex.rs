//! Simplex encoding of class labels
//!
//! GenSVM represents the `K` classes as the vertices of a regular
//! `(K-1)`-simplex with unit edge length. The coordinates only depend on `K`,
//! so both the vertex matrix and the pairwise difference rows are computed
//! once per training run.

use nalgebra::DMatrix;

/// Build the `K x (K-1)` simplex vertex matrix `U`
///
/// Row `i` holds the coordinates of the vertex assigned to class `i + 1`.
/// All vertices are at distance 1 from each other and each coordinate sums
/// to zero over the vertices.
pub fn simplex(k: usize) -> DMatrix<f64> {
    let mut u = DMatrix::zeros(k, k - 1);
    for i in 0..k {
        for j in 0..k - 1 {
            let jf = j as f64;
            if i <= j {
                u[(i, j)] = -1.0 / (2.0 * (jf + 1.0) * (jf + 2.0)).sqrt();
            } else if i == j + 1 {
                u[(i, j)] = ((jf + 1.0) / (2.0 * (jf + 2.0))).sqrt();
            }
        }
    }
    u
}

/// Build the simplex difference matrix `UU`
///
/// The result has `K * K` rows of length `K-1`; row `a * K + b` is the
/// difference `U[a, :] - U[b, :]`. During training the row for instance `i`
/// and competing class `j` is looked up with `a = y_i - 1`, `b = j`, which
/// gives the difference vector from the true-class vertex to vertex `j`.
pub fn simplex_diff(u: &DMatrix<f64>) -> DMatrix<f64> {
    let k = u.nrows();
    let mut uu = DMatrix::zeros(k * k, k - 1);
    for a in 0..k {
        for b in 0..k {
            for c in 0..k - 1 {
                uu[(a * k + b, c)] = u[(a, c)] - u[(b, c)];
            }
        }
    }
    uu
}
