//! L1 regularized linear regression
//!
//! Minimizes `(1/2n)||y - b0 - X b||^2 + lambda * ||b||_1` over a decreasing
//! sequence of penalties. Predictors are standardized with their population
//! standard deviation before fitting and coefficients are mapped back to the
//! original scale, matching the glmnet conventions.

use crate::{MathError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Settings for the coordinate-descent solver and the penalty path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoOptions {
    /// Number of penalties on the path
    pub n_lambda: usize,
    /// Smallest penalty as a fraction of the largest; chosen from the shape of `X` when unset
    pub lambda_min_ratio: Option<f64>,
    /// Coordinate-descent sweeps allowed per penalty
    pub max_iter: usize,
    /// Largest coefficient change (standardized scale) accepted as converged
    pub tolerance: f64,
}

impl Default for LassoOptions {
    fn default() -> Self {
        Self {
            n_lambda: 100,
            lambda_min_ratio: None,
            max_iter: 10_000,
            tolerance: 1e-7,
        }
    }
}

impl LassoOptions {
    fn validate(&self) -> Result<()> {
        if self.n_lambda == 0 {
            return Err(MathError::InvalidInput(
                "n_lambda must be greater than zero".to_string(),
            ));
        }
        if let Some(ratio) = self.lambda_min_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(MathError::InvalidInput(format!(
                    "lambda_min_ratio must lie in (0, 1), got {}",
                    ratio
                )));
            }
        }
        if self.max_iter == 0 || self.tolerance <= 0.0 {
            return Err(MathError::InvalidInput(
                "max_iter and tolerance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coefficients along a penalty path, on the original predictor scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoPath {
    pub lambdas: Vec<f64>,
    pub intercepts: Vec<f64>,
    /// One coefficient vector per penalty
    pub coefficients: Vec<Vec<f64>>,
    /// Whether coordinate descent met the tolerance within `max_iter` sweeps
    pub converged: Vec<bool>,
}

impl LassoPath {
    /// Number of penalties on the path
    pub fn len(&self) -> usize {
        self.lambdas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lambdas.is_empty()
    }

    /// Predictions of the model at path position `index`
    pub fn predict(&self, index: usize, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.get(index).ok_or_else(|| {
            MathError::InvalidInput(format!(
                "Path index {} out of range for {} penalties",
                index,
                self.len()
            ))
        })?;
        if x.ncols() != coefficients.len() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} predictors, got {}",
                coefficients.len(),
                x.ncols()
            )));
        }

        let beta = Array1::from(coefficients.clone());
        Ok(x.dot(&beta) + self.intercepts[index])
    }

    /// Number of penalties whose fit stopped at `max_iter`
    pub fn unconverged(&self) -> usize {
        self.converged.iter().filter(|c| !**c).count()
    }

    /// Count of non-zero coefficients at path position `index`
    pub fn n_nonzero(&self, index: usize) -> usize {
        self.coefficients
            .get(index)
            .map(|c| c.iter().filter(|v| v.abs() > 0.0).count())
            .unwrap_or(0)
    }
}

/// Centered and scaled copy of a design
struct Standardized {
    x: Array2<f64>,
    y: Array1<f64>,
    x_means: Array1<f64>,
    /// Population standard deviations; zero marks a constant column
    x_scales: Array1<f64>,
    y_mean: f64,
}

impl Standardized {
    fn new(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self> {
        let (n, p) = x.dim();
        if n == 0 || p == 0 {
            return Err(MathError::InsufficientData(format!(
                "LASSO needs at least one row and one predictor, have {} x {}",
                n, p
            )));
        }
        if y.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Design has {} rows but response has {} values",
                n,
                y.len()
            )));
        }

        let x_means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MathError::CalculationError("Empty design".to_string()))?;
        let x_scales = x.std_axis(Axis(0), 0.0);
        let y_mean = y.sum() / n as f64;

        let mut xs = &x - &x_means;
        for (j, mut col) in xs.columns_mut().into_iter().enumerate() {
            if x_scales[j] > 0.0 {
                col.mapv_inplace(|v| v / x_scales[j]);
            } else {
                col.fill(0.0);
            }
        }

        Ok(Self {
            x: xs,
            y: y.mapv(|v| v - y_mean),
            x_means,
            x_scales,
            y_mean,
        })
    }

    fn n(&self) -> f64 {
        self.x.nrows() as f64
    }

    fn lambda_max(&self) -> f64 {
        let n = self.n();
        self.x
            .columns()
            .into_iter()
            .map(|col| (col.dot(&self.y) / n).abs())
            .fold(0.0, f64::max)
    }

    /// Map standardized coefficients back to the input scale
    fn unscale(&self, b: &Array1<f64>) -> (f64, Vec<f64>) {
        let beta: Vec<f64> = b
            .iter()
            .zip(self.x_scales.iter())
            .map(|(&bj, &s)| if s > 0.0 { bj / s } else { 0.0 })
            .collect();
        let shift: f64 = beta
            .iter()
            .zip(self.x_means.iter())
            .map(|(bj, m)| bj * m)
            .sum();
        (self.y_mean - shift, beta)
    }
}

/// Decreasing, log-spaced penalties from the smallest value that zeroes
/// every coefficient down to `lambda_max * lambda_min_ratio`
pub fn lambda_sequence(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    options: &LassoOptions,
) -> Result<Vec<f64>> {
    options.validate()?;
    let standardized = Standardized::new(x, y)?;
    let lambda_max = standardized.lambda_max();
    if lambda_max <= 0.0 {
        return Ok(vec![0.0]);
    }

    let (n, p) = x.dim();
    let ratio = options
        .lambda_min_ratio
        .unwrap_or(if n > p { 1e-4 } else { 1e-2 });

    if options.n_lambda == 1 {
        return Ok(vec![lambda_max]);
    }

    let steps = (options.n_lambda - 1) as f64;
    Ok((0..options.n_lambda)
        .map(|i| lambda_max * ratio.powf(i as f64 / steps))
        .collect())
}

/// Fit the LASSO at every penalty in `lambdas`, warm-starting each fit from the previous one
pub fn fit_lasso_path(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambdas: &[f64],
    options: &LassoOptions,
) -> Result<LassoPath> {
    options.validate()?;
    if lambdas.is_empty() {
        return Err(MathError::InvalidInput(
            "Penalty path must not be empty".to_string(),
        ));
    }
    if let Some(bad) = lambdas.iter().find(|l| !(**l >= 0.0)) {
        return Err(MathError::InvalidInput(format!(
            "Penalties must be non-negative, got {}",
            bad
        )));
    }

    let standardized = Standardized::new(x, y)?;
    let n = standardized.n();
    let p = standardized.x.ncols();

    let mut b = Array1::<f64>::zeros(p);
    let mut residual = standardized.y.clone();

    let mut path = LassoPath {
        lambdas: lambdas.to_vec(),
        intercepts: Vec::with_capacity(lambdas.len()),
        coefficients: Vec::with_capacity(lambdas.len()),
        converged: Vec::with_capacity(lambdas.len()),
    };

    for &lambda in lambdas {
        let mut converged = false;
        for _sweep in 0..options.max_iter {
            let mut max_delta: f64 = 0.0;

            for j in 0..p {
                if standardized.x_scales[j] <= 0.0 {
                    continue;
                }
                let column = standardized.x.column(j);
                let old = b[j];
                // Standardized columns have unit mean square, so no division is needed
                let rho = column.dot(&residual) / n + old;
                let new = soft_threshold(rho, lambda);
                if new != old {
                    residual.scaled_add(old - new, &column);
                    b[j] = new;
                    max_delta = max_delta.max((new - old).abs());
                }
            }

            if max_delta < options.tolerance {
                converged = true;
                break;
            }
        }

        let (intercept, beta) = standardized.unscale(&b);
        path.intercepts.push(intercept);
        path.coefficients.push(beta);
        path.converged.push(converged);
    }

    Ok(path)
}

/// Soft thresholding operator
fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}
