//! Margin and loss computations
//!
//! One loss evaluation runs `Z*V`, turns the projections into scalar margins
//! against the simplex difference rows, applies the Huber hinge, and folds
//! the per-instance Lp norms together with the ridge penalty.

use crate::data::Dataset;
use crate::model::SvmModel;
use nalgebra::DMatrix;

/// Compute the scalar margins `Q` at the current `V`
///
/// `Q[i, j]` is the inner product of the projection of instance `i` with the
/// simplex difference row from its own vertex to vertex `j`. The own-class
/// entry is skipped and keeps whatever value it had; nothing downstream
/// reads it. The `Z*V` product is written into the caller-provided buffer.
pub fn calculate_errors(model: &mut SvmModel, data: &Dataset, y: &[usize], zv: &mut DMatrix<f64>) {
    data.z.multiply_into(&model.v, zv);

    let k = model.k;
    for i in 0..model.n {
        let yi = y[i] - 1;
        for j in 0..k {
            if j == yi {
                continue;
            }
            let row = yi * k + j;
            let mut q = 0.0;
            for c in 0..k - 1 {
                q += zv[(i, c)] * model.uu[(row, c)];
            }
            model.q[(i, j)] = q;
        }
    }
}

/// Apply the Huber hinge to every margin
///
/// The hinge is linear below `-kappa`, quadratic on `(-kappa, 1]`, and zero
/// above 1.
pub fn calculate_huber(model: &mut SvmModel) {
    for i in 0..model.n {
        for j in 0..model.k {
            let q = model.q[(i, j)];
            model.h[(i, j)] = huber(q, model.kappa);
        }
    }
}

/// Huber hinge of a single margin value
pub fn huber(q: f64, kappa: f64) -> f64 {
    if q <= -kappa {
        1.0 - q - (kappa + 1.0) / 2.0
    } else if q <= 1.0 {
        (1.0 - q).powi(2) / (2.0 * kappa + 2.0)
    } else {
        0.0
    }
}

/// Evaluate the loss function at the current `V`
///
/// Recomputes `Q` and `H`, then returns
/// `1/n * sum_i rho_i (sum_{j != y_i} H[i,j]^p)^(1/p)` plus the ridge
/// `lambda * ||V||_F^2` over all rows of `V` except the intercept row.
pub fn get_loss(model: &mut SvmModel, data: &Dataset, y: &[usize], zv: &mut DMatrix<f64>) -> f64 {
    calculate_errors(model, data, y, zv);
    calculate_huber(model);

    let mut loss = 0.0;
    for i in 0..model.n {
        let yi = y[i] - 1;
        let mut row_value = 0.0;
        for j in 0..model.k {
            if j == yi {
                continue;
            }
            row_value += model.h[(i, j)].powf(model.p);
        }
        loss += model.rho[i] * row_value.powf(1.0 / model.p);
    }
    loss /= model.n as f64;

    let mut penalty = 0.0;
    for i in 1..=model.m {
        for j in 0..model.k - 1 {
            penalty += model.v[(i, j)].powi(2);
        }
    }
    loss + model.lambda * penalty
}
