//! Derived fields and the balance-sheet presentation path
//!
//! Analysis transforms add new columns and keep their inputs. The
//! presentation path is separate: it flips liability signs, fills gaps with
//! zero, folds minor liabilities into one line and relabels everything for
//! display. Its output is a [`DisplayTable`], which the model builder does
//! not accept.

use crate::data::{AnalysisTable, Column, DisplayTable, TimeTable};
use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Forward points quoted in pips
pub const DEFAULT_POINTS_SCALE: f64 = 10_000.0;

fn default_points_scale() -> f64 {
    DEFAULT_POINTS_SCALE
}

/// A composable column transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Convert forward points to outright rates: `points / scale + spot`.
    ///
    /// Adds `<column>_rate` for every points column. An empty `points` list
    /// means every column of the table except `spot`. `scale` is the number
    /// of points per unit of the spot rate, 10 000 (pips) unless set.
    ForwardOutright {
        spot: String,
        #[serde(default)]
        points: Vec<String>,
        #[serde(default = "default_points_scale")]
        scale: f64,
    },
    /// `numerator / denominator`; a zero or missing denominator gives a gap
    Ratio {
        numerator: String,
        denominator: String,
        output: String,
    },
    /// `minuend - subtrahend`
    Spread {
        minuend: String,
        subtrahend: String,
        output: String,
    },
}

impl Transform {
    /// Apply to an analysis table, returning a new one
    pub fn apply(&self, table: AnalysisTable) -> Result<AnalysisTable> {
        table.map_table(|t| self.apply_table(t))
    }

    fn apply_table(&self, table: TimeTable) -> Result<TimeTable> {
        match self {
            Transform::ForwardOutright {
                spot,
                points,
                scale,
            } => forward_points_to_outright(table, spot, points, *scale),
            Transform::Ratio {
                numerator,
                denominator,
                output,
            } => ratio(table, numerator, denominator, output),
            Transform::Spread {
                minuend,
                subtrahend,
                output,
            } => spread(table, minuend, subtrahend, output),
        }
    }
}

/// Apply transforms in order
pub fn apply_transforms(table: AnalysisTable, transforms: &[Transform]) -> Result<AnalysisTable> {
    transforms
        .iter()
        .try_fold(table, |table, transform| transform.apply(table))
}

/// Add `<column>_rate = column / scale + spot` for each points column
pub fn forward_points_to_outright(
    table: TimeTable,
    spot: &str,
    points: &[String],
    scale: f64,
) -> Result<TimeTable> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(LabError::InvalidParameter(format!(
            "forward points scale must be positive, got {}",
            scale
        )));
    }
    let spot_values = table.require_column(spot)?.to_vec();
    let targets: Vec<String> = if points.is_empty() {
        table
            .column_names()
            .into_iter()
            .filter(|name| *name != spot)
            .map(String::from)
            .collect()
    } else {
        points.iter().filter(|p| *p != spot).cloned().collect()
    };

    let mut table = table;
    for column in &targets {
        let values = table.require_column(column)?;
        let outright = values
            .iter()
            .zip(&spot_values)
            .map(|(points, spot)| match (points, spot) {
                (Some(points), Some(spot)) => Some(points / scale + spot),
                _ => None,
            })
            .collect();
        table = table.with_column(format!("{}_rate", column), outright)?;
    }
    debug!(table = %table.name(), converted = targets.len(), "forward points converted");
    Ok(table)
}

/// Add `output = numerator / denominator`
pub fn ratio(table: TimeTable, numerator: &str, denominator: &str, output: &str) -> Result<TimeTable> {
    combine(table, numerator, denominator, output, |n, d| {
        if d == 0.0 {
            None
        } else {
            Some(n / d)
        }
    })
}

/// Add `output = minuend - subtrahend`
pub fn spread(table: TimeTable, minuend: &str, subtrahend: &str, output: &str) -> Result<TimeTable> {
    combine(table, minuend, subtrahend, output, |a, b| Some(a - b))
}

fn combine<F>(table: TimeTable, left: &str, right: &str, output: &str, op: F) -> Result<TimeTable>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    let values = {
        let a = table.require_column(left)?;
        let b = table.require_column(right)?;
        a.iter()
            .zip(b)
            .map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => op(*a, *b),
                _ => None,
            })
            .collect()
    };
    table.with_column(output, values)
}

/// Negate the named columns in place
pub fn flip_sign(mut table: TimeTable, columns: &[String]) -> Result<TimeTable> {
    for name in columns {
        let table_name = table.name().to_string();
        let values = table
            .column_mut(name)
            .ok_or_else(|| LabError::schema(table_name, format!("column '{}' not found", name)))?;
        for value in values.iter_mut().flatten() {
            *value = -*value;
        }
    }
    Ok(table)
}

/// Replace every missing cell with `fill`
pub fn fill_missing(table: TimeTable, fill: f64) -> Result<TimeTable> {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            Column::new(
                c.name(),
                c.values().iter().map(|v| Some(v.unwrap_or(fill))).collect(),
            )
        })
        .collect();
    rebuild(&table, columns)
}

/// Sum `components` into `output` and drop the components.
///
/// A row with any missing component gets a missing total.
pub fn aggregate(table: TimeTable, components: &[String], output: &str) -> Result<TimeTable> {
    let mut totals: Vec<Option<f64>> = vec![Some(0.0); table.len()];
    for name in components {
        for (total, value) in totals.iter_mut().zip(table.require_column(name)?) {
            *total = match (*total, value) {
                (Some(t), Some(v)) => Some(t + v),
                _ => None,
            };
        }
    }
    table.drop_columns(components).with_column(output, totals)
}

/// Rename every column through `labels`; a column without a label is an error
pub fn relabel(table: TimeTable, labels: &BTreeMap<String, String>) -> Result<TimeTable> {
    let mut columns = Vec::with_capacity(table.width());
    for column in table.columns() {
        let label = labels.get(column.name()).ok_or_else(|| LabError::UnmappedField {
            field: column.name().to_string(),
        })?;
        columns.push(Column::new(label.clone(), column.values().to_vec()));
    }
    rebuild(&table, columns)
}

fn rebuild(table: &TimeTable, columns: Vec<Column>) -> Result<TimeTable> {
    Ok(
        TimeTable::from_columns(table.name(), table.granularity(), table.periods().to_vec(), columns)?
            .with_key(table.key()),
    )
}

fn default_misc_column() -> String {
    "misc_liabilities".to_string()
}

/// Which balance-sheet lines to show and how to label them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetLayout {
    /// Asset lines, shown positive
    pub assets: Vec<String>,
    /// Liability and equity lines, shown negative
    pub liabilities: Vec<String>,
    /// Minor liabilities folded into `misc_column`
    #[serde(default)]
    pub misc_components: Vec<String>,
    #[serde(default = "default_misc_column")]
    pub misc_column: String,
    /// Display name for every remaining column
    pub labels: BTreeMap<String, String>,
}

/// Build the signed, zero-filled, relabeled balance-sheet view
pub fn present_balance_sheet(
    table: &AnalysisTable,
    layout: &BalanceSheetLayout,
) -> Result<DisplayTable> {
    let selected: Vec<String> = layout
        .assets
        .iter()
        .chain(&layout.liabilities)
        .cloned()
        .collect();

    let mut view = table.select(&selected)?;
    view = flip_sign(view, &layout.liabilities)?;
    view = fill_missing(view, 0.0)?;
    if !layout.misc_components.is_empty() {
        view = aggregate(view, &layout.misc_components, &layout.misc_column)?;
    }
    view = relabel(view, &layout.labels)?;

    info!(
        table = %table.name(),
        rows = view.len(),
        lines = view.width(),
        "balance sheet prepared for display"
    );
    Ok(DisplayTable::new(view))
}
