//! Error types for the monetary_lab crate

use polars::prelude::PolarsError;
use regress_math::MathError;
use thiserror::Error;

/// Custom error types for the monetary_lab crate
///
/// Every variant is fatal to a pipeline run and carries enough context
/// (series, column, raw value) to locate the failure.
#[derive(Debug, Error)]
pub enum LabError {
    /// Remote or local source could not be read
    #[error("Source '{series}' unavailable: {reason}")]
    SourceUnavailable { series: String, reason: String },

    /// A parsed source or table lacks an expected field
    #[error("Schema mismatch in '{series}': {detail}")]
    SchemaMismatch { series: String, detail: String },

    /// A native date could not be normalized to a period key
    #[error("Unparseable date '{value}': {reason}")]
    UnparseableDate { value: String, reason: String },

    /// Relabeling met a column with no display name
    #[error("No display label configured for field '{field}'")]
    UnmappedField { field: String },

    /// Complete-case filtering left no rows
    #[error("No usable rows for response '{response}' after alignment and missing-value omission")]
    EmptyDesignMatrix { response: String },

    #[error("Response column '{0}' not found")]
    ResponseNotFound(String),

    #[error("Predictor column '{0}' not found")]
    PredictorNotFound(String),

    /// OLS design is rank deficient; `column` is the aliased term, or the
    /// row shortfall when there are fewer rows than parameters
    #[error("Singular design at '{column}' (rank {rank})")]
    SingularDesign { column: String, rank: usize },

    #[error("Cannot run {folds}-fold cross validation on {rows} rows")]
    InsufficientFolds { folds: usize, rows: usize },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error in pipeline configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from CSV export
    #[error("CSV error: {0}")]
    Csv(String),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error from the numerical kernels
    #[error("Math error: {0}")]
    Math(MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, LabError>;

impl From<PolarsError> for LabError {
    fn from(err: PolarsError) -> Self {
        LabError::Polars(err.to_string())
    }
}

impl From<csv::Error> for LabError {
    fn from(err: csv::Error) -> Self {
        LabError::Csv(err.to_string())
    }
}

impl From<MathError> for LabError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientFolds { folds, rows } => {
                LabError::InsufficientFolds { folds, rows }
            }
            MathError::InvalidInput(msg) => LabError::InvalidParameter(msg),
            other => LabError::Math(other),
        }
    }
}

impl LabError {
    pub(crate) fn schema(series: impl Into<String>, detail: impl Into<String>) -> Self {
        LabError::SchemaMismatch {
            series: series.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unavailable(series: impl Into<String>, reason: impl ToString) -> Self {
        LabError::SourceUnavailable {
            series: series.into(),
            reason: reason.to_string(),
        }
    }
}
