//! Regression models over analysis tables
//!
//! A [`ModelSpec`] names the response, the horizon and the predictors.
//! [`build_design`] turns an [`AnalysisTable`] and a spec into an aligned
//! [`DesignMatrix`], and every [`RegressionModel`] fits a design into an
//! immutable [`FittedModel`].

use crate::data::AnalysisTable;
use crate::error::{LabError, Result};
use crate::period::Period;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use regress_math::{CvCurve, OlsSolution};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use tracing::{debug, warn};

pub mod lasso;
pub mod ols;

pub use lasso::{LassoCv, LassoCvSettings};
pub use ols::Ols;

/// Name of the intercept term in coefficient tables
pub const INTERCEPT: &str = "(Intercept)";

/// How predictors are picked from the table
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorSelection {
    /// These columns, in this order
    Explicit(Vec<String>),
    /// Table columns (response excluded) containing any `include` substring
    /// (all when empty) and none of the `exclude` substrings
    Filter {
        include: Vec<String>,
        exclude: Vec<String>,
    },
}

/// Response, horizon and predictors of one regression
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    response: String,
    horizon: i32,
    predictors: PredictorSelection,
}

impl ModelSpec {
    /// Explicit predictor list, no horizon shift
    pub fn new(response: impl Into<String>, predictors: Vec<String>) -> Self {
        Self {
            response: response.into(),
            horizon: 0,
            predictors: PredictorSelection::Explicit(predictors),
        }
    }

    /// Predictors chosen by name substrings
    pub fn filtered(response: impl Into<String>, include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            response: response.into(),
            horizon: 0,
            predictors: PredictorSelection::Filter { include, exclude },
        }
    }

    /// Lead (`k > 0`) or lag (`k < 0`) of the response in rows
    pub fn with_horizon(mut self, horizon: i32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn horizon(&self) -> i32 {
        self.horizon
    }

    pub fn predictors(&self) -> &PredictorSelection {
        &self.predictors
    }

    /// Resolve the predictor names against a table
    pub fn resolve_predictors(&self, table: &AnalysisTable) -> Result<Vec<String>> {
        match &self.predictors {
            PredictorSelection::Explicit(names) => {
                if let Some(missing) = names.iter().find(|n| !table.has_column(n)) {
                    return Err(LabError::PredictorNotFound(missing.clone()));
                }
                if names.is_empty() {
                    return Err(LabError::PredictorNotFound(
                        "no predictors given".to_string(),
                    ));
                }
                Ok(names.clone())
            }
            PredictorSelection::Filter { include, exclude } => {
                let selected: Vec<String> = table
                    .column_names()
                    .into_iter()
                    .filter(|name| *name != self.response)
                    .filter(|name| include.is_empty() || include.iter().any(|s| name.contains(s.as_str())))
                    .filter(|name| !exclude.iter().any(|s| name.contains(s.as_str())))
                    .map(String::from)
                    .collect();
                if selected.is_empty() {
                    return Err(LabError::PredictorNotFound(format!(
                        "no column matches include {:?} / exclude {:?}",
                        include, exclude
                    )));
                }
                Ok(selected)
            }
        }
    }
}

/// Response vector and predictor matrix aligned on period
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    response: String,
    predictors: Vec<String>,
    /// Period of each row (the predictor period when a horizon is set)
    periods: Vec<Period>,
    /// Period the response of each row was read from
    response_periods: Vec<Period>,
    y: Array1<f64>,
    x: Array2<f64>,
}

impl DesignMatrix {
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn response_periods(&self) -> &[Period] {
        &self.response_periods
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Rows read entirely before `cutoff`, then rows read entirely on or after it.
    ///
    /// With a horizon, a row whose predictor and response periods fall on
    /// different sides of the cutoff belongs to neither part. The result
    /// matches building each part from the table split at `cutoff`.
    pub fn split_at(&self, cutoff: Period) -> (Self, Self) {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for i in 0..self.len() {
            match (self.periods[i] < cutoff, self.response_periods[i] < cutoff) {
                (true, true) => train.push(i),
                (false, false) => test.push(i),
                _ => {}
            }
        }
        let straddling = self.len() - train.len() - test.len();
        if straddling > 0 {
            debug!(
                response = %self.response,
                %cutoff,
                straddling,
                "rows spanning the cutoff left out of both parts"
            );
        }
        (self.take_rows(&train), self.take_rows(&test))
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            response: self.response.clone(),
            predictors: self.predictors.clone(),
            periods: rows.iter().map(|&i| self.periods[i]).collect(),
            response_periods: rows.iter().map(|&i| self.response_periods[i]).collect(),
            y: self.y.select(Axis(0), rows),
            x: self.x.select(Axis(0), rows),
        }
    }
}

/// Build the design for `spec` from an analysis table.
///
/// Row `t` pairs the predictors at `t` with the response at `t + horizon`.
/// Rows without a shifted response, or with any missing cell, are omitted.
pub fn build_design(table: &AnalysisTable, spec: &ModelSpec) -> Result<DesignMatrix> {
    let response = table
        .column(spec.response())
        .ok_or_else(|| LabError::ResponseNotFound(spec.response().to_string()))?;
    let predictors = spec.resolve_predictors(table)?;
    let columns: Vec<&[Option<f64>]> = predictors
        .iter()
        .map(|name| table.require_column(name))
        .collect::<Result<_>>()?;

    let n = table.len();
    let shift = spec.horizon().unsigned_abs() as usize;
    let mut periods = Vec::with_capacity(n);
    let mut response_periods = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut x = Vec::with_capacity(n * predictors.len());
    let mut incomplete = 0usize;

    for t in 0..n {
        let source = if spec.horizon() >= 0 {
            Some(t + shift).filter(|s| *s < n)
        } else {
            t.checked_sub(shift)
        };
        let Some(source) = source else {
            continue;
        };

        let row: Option<Vec<f64>> = columns.iter().map(|c| c[t]).collect();
        match (response[source], row) {
            (Some(value), Some(row)) => {
                periods.push(table.periods()[t]);
                response_periods.push(table.periods()[source]);
                y.push(value);
                x.extend(row);
            }
            _ => incomplete += 1,
        }
    }

    if incomplete > 0 {
        warn!(
            response = %spec.response(),
            incomplete,
            "omitted rows with missing values"
        );
    }
    if periods.is_empty() {
        return Err(LabError::EmptyDesignMatrix {
            response: spec.response().to_string(),
        });
    }

    let rows = periods.len();
    let x = Array2::from_shape_vec((rows, predictors.len()), x)
        .map_err(|e| LabError::InvalidParameter(e.to_string()))?;
    debug!(
        response = %spec.response(),
        horizon = spec.horizon(),
        rows,
        predictors = predictors.len(),
        "design matrix built"
    );

    Ok(DesignMatrix {
        response: spec.response().to_string(),
        predictors,
        periods,
        response_periods,
        y: Array1::from(y),
        x,
    })
}

/// Estimation procedure of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ols,
    Lasso,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Ols => write!(f, "OLS"),
            ModelKind::Lasso => write!(f, "LASSO"),
        }
    }
}

/// Which slice of the data a model was fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrainingSample {
    pub first: Period,
    pub last: Period,
    pub n_obs: usize,
}

impl TrainingSample {
    fn of(design: &DesignMatrix) -> Result<Self> {
        match (design.periods.first(), design.periods.last()) {
            (Some(first), Some(last)) => Ok(Self {
                first: *first,
                last: *last,
                n_obs: design.len(),
            }),
            _ => Err(LabError::EmptyDesignMatrix {
                response: design.response.clone(),
            }),
        }
    }
}

/// Estimator specific output
#[derive(Debug, Clone, Serialize)]
pub enum Diagnostics {
    Ols(OlsSolution),
    Lasso(CvCurve),
}

/// One row of a coefficient table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub term: String,
    pub estimate: f64,
    pub std_error: Option<f64>,
    pub t_value: Option<f64>,
    pub p_value: Option<f64>,
}

/// A fitted regression; never mutated after fitting
#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    kind: ModelKind,
    response: String,
    intercept: f64,
    coefficients: Vec<(String, f64)>,
    penalty: f64,
    training: TrainingSample,
    diagnostics: Diagnostics,
}

impl FittedModel {
    pub(crate) fn new(
        kind: ModelKind,
        design: &DesignMatrix,
        intercept: f64,
        slopes: &[f64],
        penalty: f64,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        if slopes.len() != design.predictors.len() {
            return Err(LabError::InvalidParameter(format!(
                "{} coefficients for {} predictors",
                slopes.len(),
                design.predictors.len()
            )));
        }
        Ok(Self {
            kind,
            response: design.response.clone(),
            intercept,
            coefficients: design
                .predictors
                .iter()
                .cloned()
                .zip(slopes.iter().copied())
                .collect(),
            penalty,
            training: TrainingSample::of(design)?,
            diagnostics,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Predictor weights in design order
    pub fn coefficients(&self) -> &[(String, f64)] {
        &self.coefficients
    }

    pub fn coefficient(&self, predictor: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|(name, _)| name == predictor)
            .map(|(_, w)| *w)
    }

    /// Selected penalty; zero for OLS
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn training(&self) -> &TrainingSample {
        &self.training
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn ols_solution(&self) -> Option<&OlsSolution> {
        match &self.diagnostics {
            Diagnostics::Ols(solution) => Some(solution),
            Diagnostics::Lasso(_) => None,
        }
    }

    pub fn cv_curve(&self) -> Option<&CvCurve> {
        match &self.diagnostics {
            Diagnostics::Lasso(curve) => Some(curve),
            Diagnostics::Ols(_) => None,
        }
    }

    /// Number of predictors with a non-zero weight
    pub fn n_nonzero(&self) -> usize {
        self.coefficients.iter().filter(|(_, w)| *w != 0.0).count()
    }

    /// Predict from a matrix whose columns follow the coefficient order
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(LabError::InvalidParameter(format!(
                "model has {} predictors, matrix has {} columns",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        let beta: Array1<f64> = self.coefficients.iter().map(|(_, w)| *w).collect();
        Ok(x.dot(&beta) + self.intercept)
    }

    /// Predict every row of a design built with the same predictors
    pub fn predict_design(&self, design: &DesignMatrix) -> Result<Array1<f64>> {
        let same_terms = design.predictors.len() == self.coefficients.len()
            && design
                .predictors
                .iter()
                .zip(&self.coefficients)
                .all(|(p, (name, _))| p == name);
        if !same_terms {
            return Err(LabError::InvalidParameter(format!(
                "design predictors {:?} do not match the fitted model",
                design.predictors
            )));
        }
        self.predict(design.x.view())
    }

    /// Term, estimate and, for OLS, inference statistics; intercept first
    pub fn coefficient_table(&self) -> Vec<CoefficientRow> {
        let estimates = std::iter::once((INTERCEPT.to_string(), self.intercept))
            .chain(self.coefficients.iter().cloned());
        estimates
            .enumerate()
            .map(|(i, (term, estimate))| {
                let stat = |values: &Vec<f64>| values.get(i).copied();
                let (std_error, t_value, p_value) = match self.ols_solution() {
                    Some(s) => (stat(&s.std_errors), stat(&s.t_values), stat(&s.p_values)),
                    None => (None, None, None),
                };
                CoefficientRow {
                    term,
                    estimate,
                    std_error,
                    t_value,
                    p_value,
                }
            })
            .collect()
    }
}

impl fmt::Display for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} model for {} ({} obs, {} to {})",
            self.kind, self.response, self.training.n_obs, self.training.first, self.training.last
        )?;
        for row in self.coefficient_table() {
            match (row.std_error, row.p_value) {
                (Some(se), Some(p)) => writeln!(
                    f,
                    "  {:<28} {:>12.6} {:>12.6} {:>8.4}",
                    row.term, row.estimate, se, p
                )?,
                _ => writeln!(f, "  {:<28} {:>12.6}", row.term, row.estimate)?,
            }
        }
        match &self.diagnostics {
            Diagnostics::Ols(s) => write!(
                f,
                "  R² {:.4}, adjusted R² {:.4}, residual std error {:.4} on {} df, F {:.3} (p {:.4})",
                s.r_squared, s.adj_r_squared, s.sigma, s.df_residual, s.f_statistic, s.f_p_value
            ),
            Diagnostics::Lasso(curve) => write!(
                f,
                "  lambda {:.6} ({} of {} on path), CV MSE {:.6}, {} non-zero",
                self.penalty,
                curve.best_index + 1,
                curve.lambdas.len(),
                curve.min_error(),
                self.n_nonzero()
            ),
        }
    }
}

/// A regression procedure
pub trait RegressionModel: Debug {
    /// Fit on a design matrix
    fn fit(&self, design: &DesignMatrix) -> Result<FittedModel>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Closed set of estimators selectable from configuration
#[derive(Debug, Clone)]
pub enum Estimator {
    Ols(Ols),
    Lasso(LassoCv),
}

impl Estimator {
    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::Ols(_) => ModelKind::Ols,
            Estimator::Lasso(_) => ModelKind::Lasso,
        }
    }
}

impl RegressionModel for Estimator {
    fn fit(&self, design: &DesignMatrix) -> Result<FittedModel> {
        match self {
            Estimator::Ols(model) => model.fit(design),
            Estimator::Lasso(model) => model.fit(design),
        }
    }

    fn name(&self) -> &str {
        match self {
            Estimator::Ols(model) => model.name(),
            Estimator::Lasso(model) => model.name(),
        }
    }
}
