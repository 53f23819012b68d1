//! CSV export of tables, long-form records, coefficients and predictions
//!
//! Tables are written with one row per period and one column per field;
//! missing cells are left empty.

use crate::data::{LongRecord, TimeTable};
use crate::error::{LabError, Result};
use crate::metrics::EvaluationResult;
use crate::models::FittedModel;
use crate::period::{Granularity, Period};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Write a period-indexed table
pub fn write_table_csv<P: AsRef<Path>>(table: &TimeTable, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = Vec::with_capacity(table.width() + 1);
    header.push(table.key().to_string());
    header.extend(table.column_names().into_iter().map(String::from));
    writer.write_record(&header)?;

    for (row, period) in table.periods().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(period.to_string());
        for column in table.columns() {
            record.push(column.values()[row].map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;

    debug!(table = %table.name(), path = %path.as_ref().display(), rows = table.len(), "wrote table");
    Ok(())
}

/// Read a table written by [`write_table_csv`]
pub fn read_table_csv<P: AsRef<Path>>(path: P, granularity: Granularity) -> Result<TimeTable> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let mut fields = headers.iter();
    let key = fields
        .next()
        .ok_or_else(|| LabError::schema(&name, "file has no header"))?
        .to_string();
    let columns: Vec<String> = fields.map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw_period = record
            .get(0)
            .ok_or_else(|| LabError::schema(&name, "empty record"))?;
        let period = Period::parse(raw_period, granularity)?;
        let values = record
            .iter()
            .skip(1)
            .map(|cell| match cell.trim() {
                "" => Ok(None),
                text => text.parse::<f64>().map(Some).map_err(|_| {
                    LabError::schema(&name, format!("non-numeric cell '{}' at {}", text, raw_period))
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((period, values));
    }

    Ok(TimeTable::from_rows(name, granularity, columns, rows)?.with_key(key))
}

/// Write any serializable rows with a header taken from their field names
pub fn write_records_csv<T: Serialize, P: AsRef<Path>>(records: &[T], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Long-form `(period, category, value)` rows for charting
pub fn write_long_csv<P: AsRef<Path>>(records: &[LongRecord], path: P) -> Result<()> {
    write_records_csv(records, path)
}

/// Coefficient table of a fitted model, intercept first
pub fn write_coefficients_csv<P: AsRef<Path>>(model: &FittedModel, path: P) -> Result<()> {
    write_records_csv(&model.coefficient_table(), path)
}

/// Per-period actual and predicted values
pub fn write_predictions_csv<P: AsRef<Path>>(result: &EvaluationResult, path: P) -> Result<()> {
    write_records_csv(&result.rows, path)
}
