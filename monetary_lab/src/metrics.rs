//! Metrics for evaluating fitted regressions

use crate::error::{LabError, Result};
use crate::models::{DesignMatrix, FittedModel, RegressionModel};
use crate::period::Period;
use regress_math::r_squared;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Whether the scored rows were part of the fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    InSample,
    OutOfSample,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::InSample => write!(f, "in-sample"),
            SampleKind::OutOfSample => write!(f, "out-of-sample"),
        }
    }
}

/// Actual and predicted response for one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionRow {
    pub period: Period,
    pub actual: f64,
    pub predicted: f64,
}

/// Predictions aligned to period plus their R²
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub sample: SampleKind,
    pub rows: Vec<PredictionRow>,
    /// `1 - MSE / var(actual)`; NaN when the sample is empty or constant
    pub r_squared: f64,
    pub n: usize,
}

impl EvaluationResult {
    pub fn actual(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.actual).collect()
    }

    pub fn predicted(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.predicted).collect()
    }
}

/// Score `model` on `design`
pub fn evaluate(model: &FittedModel, design: &DesignMatrix, sample: SampleKind) -> Result<EvaluationResult> {
    let predicted = if design.is_empty() {
        Vec::new()
    } else {
        model.predict_design(design)?.to_vec()
    };
    let actual = design.y().to_vec();
    let score = r_squared(&actual, &predicted);

    let rows = design
        .periods()
        .iter()
        .zip(actual.iter().zip(&predicted))
        .map(|(period, (actual, predicted))| PredictionRow {
            period: *period,
            actual: *actual,
            predicted: *predicted,
        })
        .collect();

    Ok(EvaluationResult {
        sample,
        rows,
        r_squared: score,
        n: design.len(),
    })
}

/// Score a model on the design it was fitted on
pub fn evaluate_in_sample(model: &FittedModel, design: &DesignMatrix) -> Result<EvaluationResult> {
    evaluate(model, design, SampleKind::InSample)
}

/// Score a model on rows it never saw
pub fn evaluate_holdout(model: &FittedModel, design: &DesignMatrix) -> Result<EvaluationResult> {
    evaluate(model, design, SampleKind::OutOfSample)
}

/// Fitted model with its in-sample and out-of-sample scores
#[derive(Debug, Clone, Serialize)]
pub struct OutOfSampleReport {
    pub cutoff: Period,
    pub model: FittedModel,
    pub in_sample: EvaluationResult,
    pub out_of_sample: EvaluationResult,
}

/// Split chronologically at `cutoff` with [`DesignMatrix::split_at`], fit on the
/// rows read before it and score both parts
pub fn evaluate_out_of_sample<M: RegressionModel + ?Sized>(
    design: &DesignMatrix,
    cutoff: Period,
    estimator: &M,
) -> Result<OutOfSampleReport> {
    let (train, test) = design.split_at(cutoff);
    if train.is_empty() {
        return Err(LabError::EmptyDesignMatrix {
            response: format!("{} before {}", design.response(), cutoff),
        });
    }

    let model = estimator.fit(&train)?;
    let in_sample = evaluate_in_sample(&model, &train)?;
    let out_of_sample = evaluate_holdout(&model, &test)?;

    info!(
        model = estimator.name(),
        response = %design.response(),
        %cutoff,
        train = train.len(),
        test = test.len(),
        r2_in = in_sample.r_squared,
        r2_out = out_of_sample.r_squared,
        "out-of-sample evaluation"
    );

    Ok(OutOfSampleReport {
        cutoff,
        model,
        in_sample,
        out_of_sample,
    })
}
