//! Model state and training orchestration
//!
//! [`SvmModel`] carries the hyperparameters of the loss function together
//! with the mutable state the majorization algorithm iterates on. The
//! buffers are allocated once per training run; the workspace used inside a
//! single optimization call lives in [`crate::optimize`].

use crate::data::Dataset;
use crate::error::{GenSvmError, Result, Validate};
use crate::kernel::{self, Kernel};
use crate::matrix::DesignMatrix;
use crate::optimize;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Instance weight policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightPolicy {
    /// Every instance gets weight 1
    Unit,
    /// Group-size correction: `rho_i = n / (K * n_k)` with `n_k` the size of
    /// the class of instance `i`
    Group,
}

impl WeightPolicy {
    /// Numeric index used in model files (1 = unit, 2 = group)
    pub fn index(&self) -> u8 {
        match self {
            WeightPolicy::Unit => 1,
            WeightPolicy::Group => 2,
        }
    }

    pub fn from_index(idx: u8) -> Result<Self> {
        match idx {
            1 => Ok(WeightPolicy::Unit),
            2 => Ok(WeightPolicy::Group),
            _ => Err(GenSvmError::parameter(
                "weights",
                format!("unknown weight specification {}", idx),
            )),
        }
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone, Default)]
pub struct TrainingInfo {
    /// Number of majorization iterations performed
    pub iterations: usize,
    /// Loss function value at the final iterate
    pub loss: f64,
    /// Relative loss difference of the last iteration
    pub relative_diff: f64,
    /// Whether the stopping tolerance was reached before `max_iter`
    pub converged: bool,
    /// Whether the loss went up in the final iteration
    pub loss_increased: bool,
}

/// A GenSVM model: hyperparameters plus optimizer state
///
/// The matrices are empty until [`SvmModel::train`] is called. Afterwards
/// `v` holds the trained augmented weight matrix and `info` the convergence
/// record of the run.
#[derive(Debug, Clone)]
pub struct SvmModel {
    /// Parameter of the Lp norm over the per-class Huber errors, in `[1, 2]`
    pub p: f64,
    /// Huber hinge smoothing parameter, larger than -1
    pub kappa: f64,
    /// Regularization strength, positive
    pub lambda: f64,
    /// Relative stopping tolerance of the majorization loop, positive
    pub epsilon: f64,
    /// Iteration cap for the majorization loop
    pub max_iter: usize,
    /// Instance weighting policy
    pub weights: WeightPolicy,
    /// Kernel applied during preprocessing
    pub kernel: Kernel,
    /// Relative eigenvalue cutoff of the reduced kernel eigenbasis
    pub kernel_eigen_cutoff: f64,
    /// Seed for the V initialization heuristic; random when `None`
    pub random_seed: Option<u64>,

    /// Number of training instances
    pub n: usize,
    /// Number of features of the data the model was trained on (the
    /// eigenrank `r` when a nonlinear kernel is active)
    pub m: usize,
    /// Number of classes
    pub k: usize,

    /// Augmented weight matrix, `(m+1) x (K-1)`; row 0 is the intercept
    pub v: DMatrix<f64>,
    /// Weight matrix of the previous iteration, used for step doubling
    pub vbar: DMatrix<f64>,
    /// Simplex vertex matrix, `K x (K-1)`
    pub u: DMatrix<f64>,
    /// Simplex difference rows, `K^2 x (K-1)`; see [`crate::simplex`]
    pub uu: DMatrix<f64>,
    /// Scalar margins, `n x K`; the own-class column is never read
    pub q: DMatrix<f64>,
    /// Huber-hinged margins, `n x K`
    pub h: DMatrix<f64>,
    /// Instance weights, length `n`
    pub rho: DVector<f64>,

    /// Filename the training data came from, for model files
    pub data_file: Option<String>,
    /// Record of the last training run
    pub info: Option<TrainingInfo>,
}

impl SvmModel {
    /// Create a model with the default hyperparameters
    pub fn new() -> Self {
        Self {
            p: 1.0,
            kappa: 0.0,
            lambda: f64::powi(2.0, -8),
            epsilon: 1e-6,
            max_iter: 1_000_000_000,
            weights: WeightPolicy::Unit,
            kernel: Kernel::Linear,
            kernel_eigen_cutoff: 5e-3,
            random_seed: None,
            n: 0,
            m: 0,
            k: 0,
            v: DMatrix::zeros(0, 0),
            vbar: DMatrix::zeros(0, 0),
            u: DMatrix::zeros(0, 0),
            uu: DMatrix::zeros(0, 0),
            q: DMatrix::zeros(0, 0),
            h: DMatrix::zeros(0, 0),
            rho: DVector::zeros(0),
            data_file: None,
            info: None,
        }
    }

    /// Allocate the state buffers for the current `(n, m, k)` dimensions
    pub fn allocate(&mut self) {
        let (n, m, k) = (self.n, self.m, self.k);
        self.v = DMatrix::zeros(m + 1, k - 1);
        self.vbar = DMatrix::zeros(m + 1, k - 1);
        self.u = DMatrix::zeros(k, k - 1);
        self.uu = DMatrix::zeros(k * k, k - 1);
        self.q = DMatrix::zeros(n, k);
        self.h = DMatrix::zeros(n, k);
        self.rho = DVector::zeros(n);
    }

    /// Resize the weight matrices after kernel preprocessing changed `m`
    ///
    /// Only the feature-dependent buffers are touched; a changed feature
    /// count resets `v` and `vbar` to zero, matching a fresh start in the
    /// transformed space.
    pub fn reallocate(&mut self, m: usize) {
        if m == self.m {
            return;
        }
        self.m = m;
        self.v = DMatrix::zeros(m + 1, self.k - 1);
        self.vbar = DMatrix::zeros(m + 1, self.k - 1);
    }

    /// Initialize the instance weights according to the configured policy
    pub fn initialize_weights(&mut self, y: &[usize]) {
        match self.weights {
            WeightPolicy::Unit => self.rho.fill(1.0),
            WeightPolicy::Group => {
                let mut groups = vec![0usize; self.k];
                for &label in y {
                    groups[label - 1] += 1;
                }
                let n = self.n as f64;
                let k = self.k as f64;
                for (i, &label) in y.iter().enumerate() {
                    self.rho[i] = n / (groups[label - 1] as f64 * k);
                }
            }
        }
    }

    /// Seed the weight matrix `V`
    ///
    /// With a seed matrix of shape `(m+1) x (K-1)` the values are copied
    /// over. Otherwise each entry of row `i` is drawn uniformly from
    /// `[1/c_max, 1/c_min]`, where `c_min` and `c_max` span column `i` of
    /// the data matrix; near-zero bounds fall back to -1 and 1.
    pub fn init_v(&mut self, seed: Option<&DMatrix<f64>>, z: &DesignMatrix) -> Result<()> {
        if let Some(seed) = seed {
            if seed.nrows() != self.m + 1 || seed.ncols() != self.k - 1 {
                return Err(GenSvmError::DimensionMismatch(format!(
                    "seed matrix is {}x{}, expected {}x{}",
                    seed.nrows(),
                    seed.ncols(),
                    self.m + 1,
                    self.k - 1
                )));
            }
            self.v.copy_from(seed);
            return Ok(());
        }

        let mut rng = match self.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for i in 0..=self.m {
            let (mut cmin, mut cmax) = z.column_extent(i);
            if cmin.abs() < 1e-10 {
                cmin = -1.0;
            }
            if cmax.abs() < 1e-10 {
                cmax = 1.0;
            }
            for j in 0..self.k - 1 {
                let t: f64 = rng.gen();
                self.v[(i, j)] = 1.0 / cmin + (1.0 / cmax - 1.0 / cmin) * t;
            }
        }
        Ok(())
    }

    /// Train the model on a dataset
    ///
    /// Runs V seeding, kernel preprocessing, weight initialization, and the
    /// majorization loop. The dataset is mutated when a nonlinear kernel
    /// rewrites its representation. On a numerical failure the previous
    /// iterate of `v` is preserved and the error is returned.
    pub fn train(&mut self, data: &mut Dataset, seed: Option<&DMatrix<f64>>) -> Result<()> {
        self.validate()?;
        let y = data
            .y
            .clone()
            .ok_or_else(|| GenSvmError::InvalidLabels("training data is unlabeled".to_string()))?;

        self.n = data.n;
        self.m = data.m;
        self.k = data.k;
        if self.k < 2 {
            return Err(GenSvmError::InvalidLabels(
                "training data must contain at least two classes".to_string(),
            ));
        }

        self.allocate();
        self.init_v(seed, &data.z)?;

        kernel::preprocess(self.kernel, self.kernel_eigen_cutoff, data)?;
        self.reallocate(data.r);

        self.initialize_weights(&y);
        optimize::optimize(self, data)
    }

    /// Number of support vectors of the current solution
    ///
    /// An instance is no support vector only when its margin exceeds 1 for
    /// every competing class; requires `q` to be up to date.
    pub fn num_support_vectors(&self) -> usize {
        let mut count = 0;
        for i in 0..self.n {
            let clear = (0..self.k).filter(|&j| self.q[(i, j)] > 1.0).count();
            if clear < self.k - 1 {
                count += 1;
            }
        }
        count
    }
}

impl Default for SvmModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Validate for SvmModel {
    fn validate(&self) -> Result<()> {
        if !(1.0..=2.0).contains(&self.p) {
            return Err(GenSvmError::parameter(
                "p",
                format!("{} is outside [1, 2]", self.p),
            ));
        }
        if self.kappa <= -1.0 {
            return Err(GenSvmError::parameter(
                "kappa",
                format!("{} is not larger than -1", self.kappa),
            ));
        }
        if self.lambda <= 0.0 {
            return Err(GenSvmError::parameter(
                "lambda",
                format!("{} is not positive", self.lambda),
            ));
        }
        if self.epsilon <= 0.0 {
            return Err(GenSvmError::parameter(
                "epsilon",
                format!("{} is not positive", self.epsilon),
            ));
        }
        if self.kernel_eigen_cutoff <= 0.0 || self.kernel_eigen_cutoff >= 1.0 {
            return Err(GenSvmError::parameter(
                "kernel_eigen_cutoff",
                format!("{} is outside (0, 1)", self.kernel_eigen_cutoff),
            ));
        }
        Ok(())
    }
}
