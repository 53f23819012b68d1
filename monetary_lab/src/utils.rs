//! Utility functions for the monetary_lab crate

use crate::error::{LabError, Result};
use crate::period::Period;

/// Cutoff that leaves roughly `test_ratio` of `periods` in the test partition.
///
/// `periods` must be ascending. The test partition always keeps at least one
/// row and the training partition at least one row.
pub fn cutoff_for_ratio(periods: &[Period], test_ratio: f64) -> Result<Period> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(LabError::InvalidParameter(format!(
            "test ratio must lie in (0, 1), got {}",
            test_ratio
        )));
    }
    if periods.len() < 2 {
        return Err(LabError::InvalidParameter(format!(
            "cannot split {} periods into train and test",
            periods.len()
        )));
    }

    let test_size = ((periods.len() as f64 * test_ratio).round() as usize).clamp(1, periods.len() - 1);
    Ok(periods[periods.len() - test_size])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn months(n: u32) -> Vec<Period> {
        (1..=n).map(|m| Period::monthly(2022, m).unwrap()).collect()
    }

    #[test]
    fn ratio_cutoff_keeps_both_sides() {
        let periods = months(10);
        assert_eq!(cutoff_for_ratio(&periods, 0.3).unwrap(), periods[7]);
        assert_eq!(cutoff_for_ratio(&periods, 0.01).unwrap(), periods[9]);
        assert_eq!(cutoff_for_ratio(&periods, 0.99).unwrap(), periods[1]);
    }

    #[test]
    fn ratio_cutoff_rejects_bad_input() {
        assert!(cutoff_for_ratio(&months(10), 1.0).is_err());
        assert!(cutoff_for_ratio(&months(1), 0.5).is_err());
    }
}
