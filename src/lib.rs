//! # GenSVM
//!
//! GenSVM is a generalized multiclass support vector machine. It encodes the
//! `K` classes of a dataset as the vertices of a regular `(K-1)`-simplex and
//! fits a linear decision function in that space by minimizing a convex loss
//! with iterative majorization. Nonlinear decision boundaries are available
//! through RBF, polynomial, and sigmoid kernels, handled by a reduced
//! eigendecomposition of the kernel matrix.
//!
//! ## Example
//!
//! ```no_run
//! use gensvm::prelude::*;
//! use gensvm::na::DMatrix;
//!
//! # fn main() -> gensvm::Result<()> {
//! let x = DMatrix::from_row_slice(4, 2, &[
//!     0.0, 0.0,
//!     1.0, 0.0,
//!     0.0, 1.0,
//!     1.0, 1.0,
//! ]);
//! let y = vec![1, 2, 3, 2];
//! let mut data = Dataset::from_dense(&x, Some(y))?;
//!
//! let mut model = SvmModel::new();
//! model.p = 1.5;
//! model.train(&mut data, None)?;
//!
//! let labels = predict_labels(&data, &model)?;
//! # Ok(())
//! # }
//! ```

pub mod prelude;
pub mod data;
pub mod error;
pub mod io;
pub mod kernel;
pub mod loss;
pub mod matrix;
pub mod model;
pub mod optimize;
pub mod predict;
pub mod simplex;
pub mod update;

pub use data::Dataset;
pub use error::{GenSvmError, Result};
pub use kernel::Kernel;
pub use model::{SvmModel, WeightPolicy};

// Re-export the linear algebra crate for convenience
pub use nalgebra as na;
