//! Error types for GenSVM

use thiserror::Error;

/// Main error type for GenSVM operations
#[derive(Error, Debug)]
pub enum GenSvmError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid class labels: {0}")]
    InvalidLabels(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Eigendecomposition of the kernel matrix did not converge")]
    EigenDecompositionFailed,

    #[error("Kernel preprocessing requires a dense data matrix")]
    KernelRequiresDense,

    #[error("Majorization system is singular, even after the indefinite fallback")]
    SingularSystem,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Format error in {file}: {message}")]
    FormatError { file: String, message: String },
}

impl GenSvmError {
    /// Shorthand for an invalid-parameter error
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        GenSvmError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for GenSVM operations
pub type Result<T> = std::result::Result<T, GenSvmError>;

/// Validation trait for model and data components
pub trait Validate {
    fn validate(&self) -> Result<()>;
}
