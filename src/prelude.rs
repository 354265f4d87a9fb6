//! Prelude module for convenient imports

pub use crate::data::{Dataset, KernelBasis};
pub use crate::error::{GenSvmError, Result, Validate};
pub use crate::kernel::Kernel;
pub use crate::matrix::DesignMatrix;
pub use crate::model::{SvmModel, TrainingInfo, WeightPolicy};
pub use crate::predict::{predict_labels, prediction_accuracy};
pub use nalgebra as na;
