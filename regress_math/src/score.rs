//! Scoring rules for fitted models
//!
//! Degenerate inputs (empty, mismatched lengths, zero variance) yield `NaN`
//! rather than an error so that scores can be tabulated without special cases.

/// Mean of the squared differences between `actual` and `predicted`
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }

    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Variance with divisor `n`
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Coefficient of determination `1 - MSE / Var(actual)`.
///
/// The same rule scores in-sample and held-out predictions; for held-out data
/// the variance is taken over the held-out sample.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let mse = mean_squared_error(actual, predicted);
    let variance = population_variance(actual);
    if mse.is_nan() || variance.is_nan() || variance == 0.0 {
        return f64::NAN;
    }
    1.0 - mse / variance
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_prediction_scores_one() {
        let actual = [1.0, 3.0, 2.0, 5.0];
        assert_abs_diff_eq!(r_squared(&actual, &actual), 1.0);
    }

    #[test]
    fn predicting_the_mean_scores_zero() {
        let actual = [1.0, 3.0, 2.0, 6.0];
        let mean = [3.0; 4];
        assert_abs_diff_eq!(r_squared(&actual, &mean), 0.0);
    }

    #[test]
    fn worse_than_mean_is_negative() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [3.0, 2.0, 1.0];
        assert!(r_squared(&actual, &predicted) < 0.0);
    }

    #[test]
    fn degenerate_inputs_are_nan() {
        assert!(r_squared(&[], &[]).is_nan());
        assert!(r_squared(&[1.0, 2.0], &[1.0]).is_nan());
        assert!(r_squared(&[2.0, 2.0], &[2.0, 2.0]).is_nan());
        assert!(mean_squared_error(&[1.0], &[]).is_nan());
    }

    #[test]
    fn variance_uses_population_divisor() {
        assert_abs_diff_eq!(population_variance(&[1.0, 2.0, 3.0, 4.0]), 1.25);
    }
}
