//! Merge engine
//!
//! Series are combined by sequential inner joins on their period key:
//! `S1 ⋈ S2`, then the result `⋈ S3`, and so on. Periods missing from any
//! input are dropped from the result, and each join reports how many were
//! lost so a shrinking history is visible in the logs.

use crate::data::{AnalysisTable, Column, Series, TimeTable};
use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Suffixes appended to colliding non-key columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self::new(".x", ".y")
    }
}

/// Join `series` in order on `key`.
///
/// Every input must use `key` as its key column and share one granularity.
/// The merge order decides which side of a collision receives which suffix.
pub fn merge_all(series: &[Series], key: &str, suffixes: &Suffixes) -> Result<AnalysisTable> {
    let first = series
        .first()
        .ok_or_else(|| LabError::schema("merge", "no series to merge"))?;

    for table in series {
        if table.key() != key {
            return Err(LabError::schema(
                table.name(),
                format!("key column is '{}', expected '{}'", table.key(), key),
            ));
        }
        if table.granularity() != first.granularity() {
            return Err(LabError::schema(
                table.name(),
                format!(
                    "granularity {} does not match {} of '{}'",
                    table.granularity(),
                    first.granularity(),
                    first.name()
                ),
            ));
        }
    }

    let mut merged = first.clone();
    let mut sources = vec![first.name().to_string()];
    for right in &series[1..] {
        merged = inner_join(&merged, right, suffixes)?;
        sources.push(right.name().to_string());
    }

    let merged = merged.with_name(sources.join("+"));
    info!(
        sources = %sources.join(", "),
        rows = merged.len(),
        columns = merged.width(),
        "merged series"
    );
    Ok(AnalysisTable::new(merged, sources))
}

/// Inner join of two tables on their shared period key
pub fn inner_join(left: &TimeTable, right: &TimeTable, suffixes: &Suffixes) -> Result<TimeTable> {
    if left.key() != right.key() || left.granularity() != right.granularity() {
        return Err(LabError::schema(
            right.name(),
            format!(
                "cannot join '{}' ({} on '{}') with {} on '{}'",
                left.name(),
                left.granularity(),
                left.key(),
                right.granularity(),
                right.key()
            ),
        ));
    }

    // Both sides are strictly ascending, so one forward walk finds every match
    let (lp, rp) = (left.periods(), right.periods());
    let mut matches = Vec::with_capacity(lp.len().min(rp.len()));
    let (mut i, mut j) = (0, 0);
    while i < lp.len() && j < rp.len() {
        match lp[i].cmp(&rp[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                matches.push((i, j));
                i += 1;
                j += 1;
            }
        }
    }

    let dropped_left = lp.len() - matches.len();
    let dropped_right = rp.len() - matches.len();
    if dropped_left > 0 || dropped_right > 0 {
        warn!(
            left = %left.name(),
            right = %right.name(),
            dropped_left,
            dropped_right,
            kept = matches.len(),
            "inner join dropped unmatched periods"
        );
    }

    let periods = matches.iter().map(|&(i, _)| lp[i]).collect();
    let mut columns = Vec::with_capacity(left.width() + right.width());
    for column in left.columns() {
        let name = if right.has_column(column.name()) {
            format!("{}{}", column.name(), suffixes.left)
        } else {
            column.name().to_string()
        };
        let values = matches.iter().map(|&(i, _)| column.values()[i]).collect();
        columns.push(Column::new(name, values));
    }
    for column in right.columns() {
        let name = if left.has_column(column.name()) {
            debug!(column = %column.name(), "suffixing colliding column");
            format!("{}{}", column.name(), suffixes.right)
        } else {
            column.name().to_string()
        };
        let values = matches.iter().map(|&(_, j)| column.values()[j]).collect();
        columns.push(Column::new(name, values));
    }

    let name = format!("{}+{}", left.name(), right.name());
    let key = left.key().to_string();
    Ok(TimeTable::from_columns(name, left.granularity(), periods, columns)?.with_key(key))
}
