//! The iterative majorization driver
//!
//! Repeats loss evaluation and majorization updates until the relative loss
//! decrease drops below the model tolerance. After a burn-in the iterates
//! are extrapolated by step doubling, which roughly halves the iteration
//! count once the algorithm is inside the basin of attraction.

use crate::data::Dataset;
use crate::error::Result;
use crate::loss::get_loss;
use crate::model::{SvmModel, TrainingInfo};
use crate::simplex::{simplex, simplex_diff};
use crate::update::update;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

/// Iteration interval of the progress log line
const LOG_INTERVAL: usize = 100;

/// Number of burn-in iterations before step doubling kicks in
const STEP_DOUBLING_BURN_IN: usize = 50;

/// Scratch buffers for one optimization run
///
/// Allocated at the top of [`optimize`] and dropped on every exit path when
/// the call returns.
#[derive(Debug)]
pub struct Workspace {
    /// Projections `Z*V`, `n x (K-1)`
    pub zv: DMatrix<f64>,
    /// Row-scaled data `sqrt(alpha_i) * z_i'`, dense accumulation only
    pub lz: DMatrix<f64>,
    /// Weighted Gram matrix `Z'AZ`, `(m+1) x (m+1)`
    pub zaz: DMatrix<f64>,
    /// Right-hand side `Z'B`, `(m+1) x (K-1)`
    pub zb: DMatrix<f64>,
    /// Block-local partial sums of `Z'AZ`, CSR accumulation only
    pub tmp_zaz: DMatrix<f64>,
    /// Linear coefficient row of the instance being processed
    pub beta: DVector<f64>,
    /// All diagonal entries of `A`, CSC accumulation only
    pub a_diag: DVector<f64>,
    /// All `beta_i` rows, CSC accumulation only
    pub b_rows: DMatrix<f64>,
}

impl Workspace {
    pub fn new(n: usize, m: usize, k: usize) -> Self {
        Self {
            zv: DMatrix::zeros(n, k - 1),
            lz: DMatrix::zeros(n, m + 1),
            zaz: DMatrix::zeros(m + 1, m + 1),
            zb: DMatrix::zeros(m + 1, k - 1),
            tmp_zaz: DMatrix::zeros(m + 1, m + 1),
            beta: DVector::zeros(k - 1),
            a_diag: DVector::zeros(n),
            b_rows: DMatrix::zeros(n, k - 1),
        }
    }

    /// Clear the accumulation buffers before an update step
    pub fn reset(&mut self) {
        self.lz.fill(0.0);
        self.zaz.fill(0.0);
        self.zb.fill(0.0);
    }
}

/// Run the majorization loop until convergence
///
/// On return `model.v` holds the final iterate and `model.info` the
/// convergence record. A loss increase or an exhausted iteration budget is
/// reported as a warning, not an error; only a numerically unsolvable
/// update aborts the run.
pub fn optimize(model: &mut SvmModel, data: &Dataset) -> Result<()> {
    let n = model.n;
    let m = model.m;
    let k = model.k;
    let y = data
        .y
        .as_deref()
        .ok_or_else(|| crate::error::GenSvmError::InvalidLabels(
            "optimization needs labeled data".to_string(),
        ))?;

    let mut work = Workspace::new(n, m, k);

    info!("starting majorization loop");
    info!("dataset: n = {}, m = {}, K = {}", n, m, k);
    info!(
        "parameters: kappa = {}, p = {}, lambda = {:.16}, epsilon = {:e}",
        model.kappa, model.p, model.lambda, model.epsilon
    );

    model.u = simplex(k);
    model.uu = simplex_diff(&model.u);

    let mut loss = get_loss(model, data, y, &mut work.zv);
    let mut loss_bar = loss + 2.0 * model.epsilon * loss;

    let mut it = 0;
    while it < model.max_iter && (loss_bar - loss) / loss > model.epsilon {
        // V becomes the new iterate, Vbar the previous one
        update(model, data, y, &mut work)?;
        if it > STEP_DOUBLING_BURN_IN {
            step_doubling(model);
        }

        loss_bar = loss;
        loss = get_loss(model, data, y, &mut work.zv);

        if it % LOG_INTERVAL == 0 {
            debug!(
                "iter = {}, L = {:.16}, Lbar = {:.16}, reldiff = {:.16}",
                it,
                loss,
                loss_bar,
                (loss_bar - loss) / loss
            );
        }
        it += 1;
    }

    let relative_diff = (loss_bar - loss) / loss;
    let loss_increased = loss > loss_bar;
    let converged = relative_diff <= model.epsilon;

    if loss_increased {
        warn!("negative step occurred in majorization");
    }
    if it >= model.max_iter {
        warn!("maximum number of iterations reached without convergence");
    }

    info!(
        "optimization finished: iter = {}, loss = {:.16}, rel. diff. = {:.16}",
        it.saturating_sub(1),
        loss,
        relative_diff
    );
    info!("number of support vectors: {}", model.num_support_vectors());

    model.info = Some(TrainingInfo {
        iterations: it,
        loss,
        relative_diff,
        converged,
        loss_increased,
    });
    Ok(())
}

/// Extrapolate the iterate across the minimizer of the majorizer
///
/// Replaces `V` by `2*V - Vbar` elementwise.
pub fn step_doubling(model: &mut SvmModel) {
    for i in 0..=model.m {
        for j in 0..model.k - 1 {
            model.v[(i, j)] = 2.0 * model.v[(i, j)] - model.vbar[(i, j)];
        }
    }
}
