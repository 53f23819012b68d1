//! Period-indexed tables
//!
//! [`TimeTable`] is the single tabular type of the crate: one row per
//! canonical period, ascending, and any number of named numeric columns with
//! missing cells. Loaders produce [`Series`], the merge engine produces
//! [`AnalysisTable`]s and the balance-sheet presentation path produces
//! [`DisplayTable`]s, which the model builder does not accept.

use crate::error::{LabError, Result};
use crate::period::{Granularity, Period};
use polars::prelude::{DataFrame, NamedFrom, Series as FrameSeries};
use serde::Serialize;
use std::ops::Deref;

/// A named numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// Time series table keyed by [`Period`]
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable {
    /// Source or stage name, used in error messages
    name: String,
    /// Name of the key column
    key: String,
    granularity: Granularity,
    periods: Vec<Period>,
    columns: Vec<Column>,
}

/// A single normalized source table
pub type Series = TimeTable;

/// Long-form row for the visualization layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRecord {
    pub period: Period,
    pub category: String,
    pub value: f64,
}

impl TimeTable {
    /// Default key column name
    pub const DEFAULT_KEY: &'static str = "period";

    /// Build a table from unordered rows.
    ///
    /// Rows are sorted by period. Duplicate periods, rows of the wrong width
    /// and periods of another granularity are rejected.
    pub fn from_rows(
        name: impl Into<String>,
        granularity: Granularity,
        column_names: Vec<String>,
        mut rows: Vec<(Period, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let name = name.into();
        for (i, column) in column_names.iter().enumerate() {
            if column == Self::DEFAULT_KEY || column_names[..i].contains(column) {
                return Err(LabError::schema(
                    &name,
                    format!("duplicate or reserved column name '{}'", column),
                ));
            }
        }

        rows.sort_by_key(|(period, _)| *period);

        let mut periods = Vec::with_capacity(rows.len());
        let mut columns: Vec<Column> = column_names
            .into_iter()
            .map(|c| Column::new(c, Vec::with_capacity(rows.len())))
            .collect();

        for (period, values) in rows {
            if period.granularity() != granularity {
                return Err(LabError::schema(
                    &name,
                    format!("period {} is not {}", period, granularity),
                ));
            }
            if periods.last() == Some(&period) {
                return Err(LabError::schema(
                    &name,
                    format!("duplicate period {}", period),
                ));
            }
            if values.len() != columns.len() {
                return Err(LabError::schema(
                    &name,
                    format!(
                        "row {} has {} values, expected {}",
                        period,
                        values.len(),
                        columns.len()
                    ),
                ));
            }
            periods.push(period);
            for (column, value) in columns.iter_mut().zip(values) {
                column.values.push(value);
            }
        }

        Ok(Self {
            name,
            key: Self::DEFAULT_KEY.to_string(),
            granularity,
            periods,
            columns,
        })
    }

    /// Build a table from ascending periods and whole columns
    pub fn from_columns(
        name: impl Into<String>,
        granularity: Granularity,
        periods: Vec<Period>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        let name = name.into();
        if periods.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LabError::schema(
                &name,
                "periods must be strictly ascending",
            ));
        }
        if let Some(period) = periods.iter().find(|p| p.granularity() != granularity) {
            return Err(LabError::schema(
                &name,
                format!("period {} is not {}", period, granularity),
            ));
        }

        let mut table = Self {
            name,
            key: Self::DEFAULT_KEY.to_string(),
            granularity,
            periods,
            columns: Vec::with_capacity(columns.len()),
        };
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Rename the key column
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Rename the table
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Number of value columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a column, if present
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Values of a column, failing with `SchemaMismatch` when absent
    pub fn require_column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| LabError::schema(&self.name, format!("column '{}' not found", name)))
    }

    /// Cell value at `row` in column `name`
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)
            .and_then(|values| values.get(row).copied().flatten())
    }

    /// Row index of a period
    pub fn position(&self, period: Period) -> Option<usize> {
        self.periods.binary_search(&period).ok()
    }

    /// Append a column
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if column.values.len() != self.periods.len() {
            return Err(LabError::schema(
                &self.name,
                format!(
                    "column '{}' has {} values for {} periods",
                    column.name,
                    column.values.len(),
                    self.periods.len()
                ),
            ));
        }
        if column.name == self.key || self.has_column(&column.name) {
            return Err(LabError::schema(
                &self.name,
                format!("column '{}' already exists", column.name),
            ));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Append a column, consuming the table
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.push_column(Column::new(name, values))?;
        Ok(self)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Option<f64>>> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.values)
    }

    /// Remove the named columns; unknown names are ignored
    pub fn drop_columns(mut self, names: &[String]) -> Self {
        self.columns.retain(|c| !names.contains(&c.name));
        self
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values = self.require_column(name)?;
            columns.push(Column::new(name.clone(), values.to_vec()));
        }
        Ok(Self {
            name: self.name.clone(),
            key: self.key.clone(),
            granularity: self.granularity,
            periods: self.periods.clone(),
            columns,
        })
    }

    /// Rows `start..end` (end defaults to the table length)
    pub fn slice(&self, start: usize, end: Option<usize>) -> Self {
        let end = end.unwrap_or(self.len()).min(self.len());
        let start = start.min(end);
        self.take_rows(&(start..end).collect::<Vec<_>>())
    }

    /// Rows whose period satisfies `keep`
    pub fn filter_periods<F: Fn(&Period) -> bool>(&self, keep: F) -> Self {
        let rows: Vec<usize> = self
            .periods
            .iter()
            .enumerate()
            .filter(|(_, p)| keep(p))
            .map(|(i, _)| i)
            .collect();
        self.take_rows(&rows)
    }

    /// Chronological split: periods before `cutoff`, then periods on or after it
    pub fn split_at(&self, cutoff: Period) -> (Self, Self) {
        (
            self.filter_periods(|p| *p < cutoff),
            self.filter_periods(|p| *p >= cutoff),
        )
    }

    pub(crate) fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            key: self.key.clone(),
            granularity: self.granularity,
            periods: rows.iter().map(|&i| self.periods[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), rows.iter().map(|&i| c.values[i]).collect()))
                .collect(),
        }
    }

    /// Reshape to `(period, column, value)` records, skipping missing cells
    pub fn to_long(&self) -> Vec<LongRecord> {
        let mut records = Vec::with_capacity(self.len() * self.width());
        for (row, period) in self.periods.iter().enumerate() {
            for column in &self.columns {
                if let Some(value) = column.values[row] {
                    records.push(LongRecord {
                        period: *period,
                        category: column.name.clone(),
                        value,
                    });
                }
            }
        }
        records
    }

    /// Convert to a polars DataFrame with the key rendered as text
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut frame_columns = Vec::with_capacity(self.width() + 1);
        let keys: Vec<String> = self.periods.iter().map(|p| p.to_string()).collect();
        frame_columns.push(FrameSeries::new(&self.key, keys));
        for column in &self.columns {
            frame_columns.push(FrameSeries::new(&column.name, column.values.clone()));
        }
        Ok(DataFrame::new(frame_columns)?)
    }
}

/// Result of joining several series on their period key
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTable {
    table: TimeTable,
    /// Contributing series, in merge order
    sources: Vec<String>,
}

impl AnalysisTable {
    pub fn new(table: TimeTable, sources: Vec<String>) -> Self {
        Self { table, sources }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn table(&self) -> &TimeTable {
        &self.table
    }

    pub fn into_table(self) -> TimeTable {
        self.table
    }

    /// Apply a table-level change and keep the provenance
    pub(crate) fn map_table<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(TimeTable) -> Result<TimeTable>,
    {
        Ok(Self {
            table: f(self.table)?,
            sources: self.sources,
        })
    }

    /// Chronological split keeping the provenance on both halves
    pub fn split_at(&self, cutoff: Period) -> (Self, Self) {
        let (train, test) = self.table.split_at(cutoff);
        (
            Self::new(train, self.sources.clone()),
            Self::new(test, self.sources.clone()),
        )
    }
}

impl Deref for AnalysisTable {
    type Target = TimeTable;

    fn deref(&self) -> &TimeTable {
        &self.table
    }
}

/// Presentation-only table: signs flipped, gaps filled with zero, labels applied
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    table: TimeTable,
}

impl DisplayTable {
    pub(crate) fn new(table: TimeTable) -> Self {
        Self { table }
    }

    /// Long-form records for a stacked-area chart
    pub fn to_long(&self) -> Vec<LongRecord> {
        self.table.to_long()
    }

    pub fn table(&self) -> &TimeTable {
        &self.table
    }
}

impl Deref for DisplayTable {
    type Target = TimeTable;

    fn deref(&self) -> &TimeTable {
        &self.table
    }
}
