//! # Regress Math
//!
//! Numerical kernels behind the macro regression models.
//! This crate provides a QR based least-squares solver with inference
//! statistics, a glmnet style LASSO path fitted by coordinate descent,
//! seeded k-fold cross validation and the R² scoring rule.

use thiserror::Error;

// Kernel modules
pub mod cv;
pub mod lasso;
pub mod linalg;
pub mod ols;
pub mod score;

pub use crate::cv::{cross_validate_lasso, fold_assignment, CvCurve};
pub use crate::lasso::{fit_lasso_path, lambda_sequence, LassoOptions, LassoPath};
pub use crate::ols::{fit_ols, OlsSolution};
pub use crate::score::{mean_squared_error, population_variance, r_squared};

/// Errors that can occur in the regression kernels
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    /// Column `column` of the design (0 = intercept) is a linear combination
    /// of the columns before it.
    #[error("Design matrix is rank deficient at column {column} (rank {rank})")]
    RankDeficient { column: usize, rank: usize },

    #[error("Cannot estimate {parameters} parameters from {rows} rows")]
    TooFewRows { rows: usize, parameters: usize },

    #[error("Cannot split {rows} rows into {folds} folds")]
    InsufficientFolds { folds: usize, rows: usize },
}

/// Result type for regression math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
