//! Ordinary least squares with an intercept
//!
//! The fit goes through a Householder QR of `[1 | X]`, so a rank deficient
//! design is reported instead of being absorbed by a pseudo-inverse.
//! Inference statistics follow the classical homoskedastic formulas.

use crate::linalg::Qr;
use crate::score::r_squared;
use crate::{MathError, Result};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Solution of an OLS problem. Index 0 of every coefficient vector is the intercept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsSolution {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Residual sum of squares
    pub rss: f64,
    pub df_residual: usize,
    /// Residual standard error
    pub sigma: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub n_obs: usize,
}

impl OlsSolution {
    /// Intercept term
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    /// Slope coefficients, in predictor order
    pub fn slopes(&self) -> &[f64] {
        &self.coefficients[1..]
    }
}

/// Fit `y = b0 + X b` by least squares.
///
/// A [`MathError::RankDeficient`] column index counts the intercept as column 0.
pub fn fit_ols(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<OlsSolution> {
    let (n, k) = x.dim();
    if n != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but response has {} values",
            n,
            y.len()
        )));
    }
    if n == 0 {
        return Err(MathError::InsufficientData(
            "Cannot fit a regression on zero rows".to_string(),
        ));
    }

    let p = k + 1;
    if n < p {
        return Err(MathError::TooFewRows { rows: n, parameters: p });
    }

    let design = with_intercept(x)?;
    let qr = Qr::decompose(design.view())?;
    let beta = qr.solve(y)?;

    let fitted = design.dot(&beta);
    let residuals = &y - &fitted;
    let rss = residuals.dot(&residuals);
    let df_residual = n - p;

    let mean_y = y.sum() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let r2 = r_squared(&y.to_vec(), &fitted.to_vec());

    let (sigma, adj_r2) = if df_residual > 0 {
        let sigma2 = rss / df_residual as f64;
        let adj = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / df_residual as f64;
        (sigma2.sqrt(), adj)
    } else {
        (f64::NAN, f64::NAN)
    };

    // Cov(b) = sigma^2 (R^T R)^-1 = sigma^2 R^-1 R^-T
    let r_inv = qr.r_inverse()?;
    let std_errors: Array1<f64> = r_inv
        .rows()
        .into_iter()
        .map(|row| sigma * row.dot(&row).sqrt())
        .collect();

    let t_values: Array1<f64> = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(b, se)| b / se)
        .collect();

    let p_values = two_sided_p_values(&t_values, df_residual);

    let (f_statistic, f_p_value) = if k > 0 && df_residual > 0 && rss > 0.0 {
        let f = ((tss - rss) / k as f64) / (rss / df_residual as f64);
        let p = FisherSnedecor::new(k as f64, df_residual as f64)
            .map(|dist| 1.0 - dist.cdf(f))
            .unwrap_or(f64::NAN);
        (f, p)
    } else {
        (f64::NAN, f64::NAN)
    };

    Ok(OlsSolution {
        coefficients: beta.to_vec(),
        std_errors: std_errors.to_vec(),
        t_values: t_values.to_vec(),
        p_values,
        fitted: fitted.to_vec(),
        residuals: residuals.to_vec(),
        rss,
        df_residual,
        sigma,
        r_squared: r2,
        adj_r_squared: adj_r2,
        f_statistic,
        f_p_value,
        n_obs: n,
    })
}

/// Prepend a column of ones
fn with_intercept(x: ArrayView2<f64>) -> Result<Array2<f64>> {
    let ones = Array2::<f64>::ones((x.nrows(), 1));
    concatenate(Axis(1), &[ones.view(), x.view()]).map_err(|e| MathError::CalculationError(e.to_string()))
}

fn two_sided_p_values(t_values: &Array1<f64>, df: usize) -> Vec<f64> {
    if df == 0 {
        return vec![f64::NAN; t_values.len()];
    }
    match StudentsT::new(0.0, 1.0, df as f64) {
        Ok(dist) => t_values
            .iter()
            .map(|t| {
                if t.is_nan() {
                    f64::NAN
                } else {
                    2.0 * dist.cdf(-t.abs())
                }
            })
            .collect(),
        Err(_) => vec![f64::NAN; t_values.len()],
    }
}
