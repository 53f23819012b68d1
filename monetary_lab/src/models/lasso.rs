//! Cross-validated LASSO
//!
//! The penalty path is computed on the full training sample, every fold is
//! fitted along that path, and the penalty with the smallest mean held-out
//! error is refitted on the whole sample.

use super::{DesignMatrix, Diagnostics, FittedModel, ModelKind, RegressionModel};
use crate::error::{LabError, Result};
use regress_math::{cross_validate_lasso, fit_lasso_path, lambda_sequence, LassoOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fold count, seed and solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoCvSettings {
    pub folds: usize,
    /// Seed of the fold assignment
    pub seed: u64,
    pub n_lambda: usize,
    pub lambda_min_ratio: Option<f64>,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for LassoCvSettings {
    fn default() -> Self {
        let options = LassoOptions::default();
        Self {
            folds: 3,
            seed: 42,
            n_lambda: options.n_lambda,
            lambda_min_ratio: options.lambda_min_ratio,
            max_iter: options.max_iter,
            tolerance: options.tolerance,
        }
    }
}

impl LassoCvSettings {
    fn options(&self) -> LassoOptions {
        LassoOptions {
            n_lambda: self.n_lambda,
            lambda_min_ratio: self.lambda_min_ratio,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
        }
    }
}

/// LASSO with the penalty chosen by k-fold cross validation
#[derive(Debug, Clone)]
pub struct LassoCv {
    settings: LassoCvSettings,
}

impl LassoCv {
    pub fn new(settings: LassoCvSettings) -> Result<Self> {
        if settings.folds < 2 {
            return Err(LabError::InvalidParameter(format!(
                "cross validation needs at least 2 folds, got {}",
                settings.folds
            )));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &LassoCvSettings {
        &self.settings
    }
}

impl RegressionModel for LassoCv {
    fn fit(&self, design: &DesignMatrix) -> Result<FittedModel> {
        let (x, y) = (design.x().view(), design.y().view());
        if self.settings.folds > design.len() {
            return Err(LabError::InsufficientFolds {
                folds: self.settings.folds,
                rows: design.len(),
            });
        }

        let options = self.settings.options();
        let lambdas = lambda_sequence(x, y, &options)?;
        let curve = cross_validate_lasso(
            x,
            y,
            &lambdas,
            self.settings.folds,
            self.settings.seed,
            &options,
        )?;
        let best = curve.best_index;
        if curve.unconverged_fits > 0 {
            warn!(
                response = %design.response(),
                unconverged = curve.unconverged_fits,
                max_iter = self.settings.max_iter,
                "coordinate descent did not converge in some cross-validation fits"
            );
        }
        debug!(
            response = %design.response(),
            path = lambdas.len(),
            best,
            cv_mse = curve.min_error(),
            "cross validation finished"
        );

        // Warm-started refit down the path to the selected penalty
        let path = fit_lasso_path(x, y, &curve.lambdas[..=best], &options)?;
        let last = path.len() - 1;
        let penalty = curve.lambda_min();
        if !path.converged[last] {
            warn!(
                response = %design.response(),
                lambda = penalty,
                max_iter = self.settings.max_iter,
                "coordinate descent did not converge at the selected penalty"
            );
        }

        info!(
            response = %design.response(),
            n_obs = design.len(),
            lambda = penalty,
            nonzero = path.n_nonzero(last),
            "fitted LASSO"
        );

        FittedModel::new(
            ModelKind::Lasso,
            design,
            path.intercepts[last],
            &path.coefficients[last],
            penalty,
            Diagnostics::Lasso(curve),
        )
    }

    fn name(&self) -> &str {
        "LASSO"
    }
}
