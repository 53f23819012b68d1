//! Ordinary least squares

use super::{DesignMatrix, Diagnostics, FittedModel, ModelKind, RegressionModel, INTERCEPT};
use crate::error::{LabError, Result};
use regress_math::{fit_ols, MathError};
use tracing::info;

/// OLS with an intercept, fitted by QR
#[derive(Debug, Clone, Default)]
pub struct Ols;

impl Ols {
    pub fn new() -> Self {
        Ols
    }
}

impl RegressionModel for Ols {
    fn fit(&self, design: &DesignMatrix) -> Result<FittedModel> {
        let solution = fit_ols(design.x().view(), design.y().view())
            .map_err(|err| singular_design(err, design))?;

        info!(
            response = %design.response(),
            n_obs = solution.n_obs,
            r_squared = solution.r_squared,
            "fitted OLS"
        );

        let intercept = solution.intercept();
        let slopes = solution.slopes().to_vec();
        FittedModel::new(
            ModelKind::Ols,
            design,
            intercept,
            &slopes,
            0.0,
            Diagnostics::Ols(solution),
        )
    }

    fn name(&self) -> &str {
        "OLS"
    }
}

/// Name the aliased term of a rank deficient design
fn singular_design(err: MathError, design: &DesignMatrix) -> LabError {
    match err {
        MathError::RankDeficient { column, rank } => {
            let column = match column {
                0 => INTERCEPT.to_string(),
                i => design
                    .predictors()
                    .get(i - 1)
                    .cloned()
                    .unwrap_or_else(|| format!("column {}", i)),
            };
            LabError::SingularDesign { column, rank }
        }
        MathError::TooFewRows { rows, parameters } => LabError::SingularDesign {
            column: format!("(rows < parameters: {} < {})", rows, parameters),
            rank: rows,
        },
        other => other.into(),
    }
}
