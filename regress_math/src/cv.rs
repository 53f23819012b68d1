//! Seeded k-fold cross validation for the LASSO penalty
//!
//! Fold membership is drawn once from an explicit seed, every fold is fitted
//! on the same penalty sequence, and the selected penalty is the one with the
//! smallest mean held-out squared error.

use crate::lasso::{fit_lasso_path, LassoOptions};
use crate::{MathError, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Assign each of `n` rows to one of `folds` groups.
///
/// Labels `0..folds` are repeated to length `n` and shuffled, so fold sizes
/// differ by at most one and the assignment depends only on `seed`.
pub fn fold_assignment(n: usize, folds: usize, seed: u64) -> Result<Vec<usize>> {
    if folds < 2 {
        return Err(MathError::InvalidInput(format!(
            "Cross validation needs at least 2 folds, got {}",
            folds
        )));
    }
    if folds > n {
        return Err(MathError::InsufficientFolds { folds, rows: n });
    }

    let mut ids: Vec<usize> = (0..n).map(|i| i % folds).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);
    Ok(ids)
}

/// Cross-validated error along a penalty path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvCurve {
    pub lambdas: Vec<f64>,
    /// Mean held-out squared error per penalty
    pub mean_error: Vec<f64>,
    /// Standard error of `mean_error` across folds
    pub std_error: Vec<f64>,
    /// Position of the smallest mean error
    pub best_index: usize,
    pub fold_ids: Vec<usize>,
    /// Fold fits, across all penalties, that stopped at `max_iter`
    pub unconverged_fits: usize,
}

impl CvCurve {
    /// Penalty with the smallest mean cross-validated error
    pub fn lambda_min(&self) -> f64 {
        self.lambdas[self.best_index]
    }

    /// Smallest mean cross-validated error
    pub fn min_error(&self) -> f64 {
        self.mean_error[self.best_index]
    }
}

/// Run k-fold cross validation of the LASSO over `lambdas`
pub fn cross_validate_lasso(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambdas: &[f64],
    folds: usize,
    seed: u64,
    options: &LassoOptions,
) -> Result<CvCurve> {
    let n = x.nrows();
    if y.len() != n {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but response has {} values",
            n,
            y.len()
        )));
    }
    if lambdas.is_empty() {
        return Err(MathError::InvalidInput(
            "Penalty path must not be empty".to_string(),
        ));
    }

    let fold_ids = fold_assignment(n, folds, seed)?;

    // fold_mse[f][l]: mean squared error of fold f at penalty l
    let mut fold_mse = Vec::with_capacity(folds);
    let mut fold_sizes = Vec::with_capacity(folds);
    let mut unconverged_fits = 0;

    for fold in 0..folds {
        let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&i| fold_ids[i] == fold);

        let x_train = x.select(Axis(0), &train_rows);
        let y_train = y.select(Axis(0), &train_rows);
        let x_test = x.select(Axis(0), &test_rows);
        let y_test = y.select(Axis(0), &test_rows);

        let path = fit_lasso_path(x_train.view(), y_train.view(), lambdas, options)?;
        unconverged_fits += path.unconverged();

        let mut errors = Vec::with_capacity(lambdas.len());
        for l in 0..lambdas.len() {
            let predicted = path.predict(l, x_test.view())?;
            let sse: f64 = y_test
                .iter()
                .zip(predicted.iter())
                .map(|(a, p)| (a - p).powi(2))
                .sum();
            errors.push(sse / test_rows.len() as f64);
        }

        fold_mse.push(errors);
        fold_sizes.push(test_rows.len() as f64);
    }

    let total: f64 = fold_sizes.iter().sum();
    let mut mean_error = Vec::with_capacity(lambdas.len());
    let mut std_error = Vec::with_capacity(lambdas.len());

    for l in 0..lambdas.len() {
        let mean = fold_mse
            .iter()
            .zip(fold_sizes.iter())
            .map(|(errs, w)| errs[l] * w)
            .sum::<f64>()
            / total;
        let spread = fold_mse
            .iter()
            .zip(fold_sizes.iter())
            .map(|(errs, w)| (errs[l] - mean).powi(2) * w)
            .sum::<f64>()
            / total;
        mean_error.push(mean);
        std_error.push((spread / (folds as f64 - 1.0)).sqrt());
    }

    let best_index = mean_error
        .iter()
        .enumerate()
        .fold(0, |best, (i, &e)| if e < mean_error[best] { i } else { best });

    Ok(CvCurve {
        lambdas: lambdas.to_vec(),
        mean_error,
        std_error,
        best_index,
        fold_ids,
        unconverged_fits,
    })
}
