//! Series loading
//!
//! A [`SourceSpec`] pins everything the loader needs to know about one
//! remote series: where to fetch it, where the record array sits inside the
//! JSON envelope, which field carries the date and which fields to keep under
//! which working names. Fetching is delegated to a [`SeriesSource`], so the
//! same parsing runs against HTTP, files on disk, or in-memory fixtures.

use crate::data::{Series, TimeTable};
use crate::error::{LabError, Result};
use crate::period::{parse_native_date, DateFormat, Granularity, Period};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Select a source field and give it a working name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub from: String,
    pub to: String,
}

impl FieldMapping {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

fn default_granularity() -> Granularity {
    Granularity::Monthly
}

/// Pinned description of one external series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Name used for the resulting series and in error messages
    pub name: String,
    /// Endpoint including every query parameter
    pub url: String,
    /// Keys leading from the envelope root to the record array
    #[serde(default)]
    pub records_path: Vec<String>,
    /// Record field holding the native date
    pub date_field: String,
    /// Layout of the native date; detected from its shape when unset
    #[serde(default)]
    pub date_format: Option<DateFormat>,
    /// Granularity of the produced series
    #[serde(default = "default_granularity")]
    pub granularity: Granularity,
    /// Fields to keep, in output order
    pub fields: Vec<FieldMapping>,
}

/// Something that can produce the raw JSON document of a source
pub trait SeriesSource {
    fn fetch(&self, spec: &SourceSpec) -> Result<Value>;
}

/// Blocking HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LabError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl SeriesSource for HttpSource {
    fn fetch(&self, spec: &SourceSpec) -> Result<Value> {
        debug!(series = %spec.name, url = %spec.url, "fetching series");
        let response = self
            .client
            .get(&spec.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LabError::unavailable(&spec.name, e))?;
        let body = response
            .text()
            .map_err(|e| LabError::unavailable(&spec.name, e))?;
        parse_document(&spec.name, &body)
    }
}

/// Reads `<dir>/<name>.json`, for replaying saved responses offline
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, spec: &SourceSpec) -> PathBuf {
        self.dir.join(format!("{}.json", spec.name))
    }
}

impl SeriesSource for FileSource {
    fn fetch(&self, spec: &SourceSpec) -> Result<Value> {
        let path = self.path_for(spec);
        debug!(series = %spec.name, path = %path.display(), "reading series");
        let body = std::fs::read_to_string(&path).map_err(|e| {
            LabError::unavailable(&spec.name, format!("{}: {}", path.display(), e))
        })?;
        parse_document(&spec.name, &body)
    }
}

/// In-memory payloads keyed by source name
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    payloads: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON body returned for `name`
    pub fn with_payload(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.payloads.insert(name.into(), body.into());
        self
    }
}

impl SeriesSource for StaticSource {
    fn fetch(&self, spec: &SourceSpec) -> Result<Value> {
        let body = self
            .payloads
            .get(&spec.name)
            .ok_or_else(|| LabError::unavailable(&spec.name, "no payload registered"))?;
        parse_document(&spec.name, body)
    }
}

fn parse_document(series: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| LabError::schema(series, format!("response is not valid JSON: {}", e)))
}

/// Loader for external series
#[derive(Debug)]
pub struct SeriesLoader;

impl SeriesLoader {
    /// Fetch and normalize one series
    pub fn load(source: &dyn SeriesSource, spec: &SourceSpec) -> Result<Series> {
        let document = source.fetch(spec)?;
        Self::from_json(spec, &document)
    }

    /// Fetch every spec in order; the first failure aborts
    pub fn load_all(source: &dyn SeriesSource, specs: &[SourceSpec]) -> Result<Vec<Series>> {
        specs.iter().map(|spec| Self::load(source, spec)).collect()
    }

    /// Normalize an already fetched document
    pub fn from_json(spec: &SourceSpec, document: &Value) -> Result<Series> {
        let records = Self::records(spec, document)?;
        if records.is_empty() {
            return Err(LabError::schema(&spec.name, "source returned no records"));
        }

        let mut rows: Vec<(Period, NaiveDate, Vec<Option<f64>>)> = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            rows.push(Self::parse_record(spec, index, record)?);
        }
        let fetched = rows.len();

        // Latest native date first within each period, then keep one row per period
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        rows.dedup_by_key(|row| row.0);

        let kept = rows.len();
        let names = spec.fields.iter().map(|f| f.to.clone()).collect();
        let table = TimeTable::from_rows(
            spec.name.clone(),
            spec.granularity,
            names,
            rows.into_iter()
                .map(|(period, _, values)| (period, values))
                .collect(),
        )?;

        info!(series = %spec.name, fetched, kept, granularity = %spec.granularity, "loaded series");
        Ok(table)
    }

    fn records<'v>(spec: &SourceSpec, document: &'v Value) -> Result<&'v Vec<Value>> {
        let mut node = document;
        for key in &spec.records_path {
            node = node.get(key).ok_or_else(|| {
                LabError::schema(&spec.name, format!("envelope has no key '{}'", key))
            })?;
        }
        node.as_array().ok_or_else(|| {
            LabError::schema(
                &spec.name,
                format!("expected a record array at '{}'", spec.records_path.join(".")),
            )
        })
    }

    fn parse_record(
        spec: &SourceSpec,
        index: usize,
        record: &Value,
    ) -> Result<(Period, NaiveDate, Vec<Option<f64>>)> {
        let object = record.as_object().ok_or_else(|| {
            LabError::schema(&spec.name, format!("record {} is not an object", index))
        })?;

        let raw_date = match object.get(&spec.date_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
            _ => {
                return Err(LabError::schema(
                    &spec.name,
                    format!("record {} lacks date field '{}'", index, spec.date_field),
                ))
            }
        };

        let parsed = match spec.date_format {
            Some(format) => format.parse(&raw_date),
            None => parse_native_date(&raw_date),
        };
        let native = parsed.map_err(|e| match e {
            LabError::UnparseableDate { value, reason } => LabError::UnparseableDate {
                value,
                reason: format!("{} (series '{}', field '{}')", reason, spec.name, spec.date_field),
            },
            other => other,
        })?;
        let period = Period::from_date(native, spec.granularity);

        let mut values = Vec::with_capacity(spec.fields.len());
        for mapping in &spec.fields {
            let cell = object.get(&mapping.from).ok_or_else(|| {
                LabError::schema(
                    &spec.name,
                    format!("record for {} lacks field '{}'", raw_date, mapping.from),
                )
            })?;
            let value = parse_cell(cell).ok_or_else(|| {
                LabError::schema(
                    &spec.name,
                    format!(
                        "non-numeric value {} in field '{}' at {}",
                        cell, mapping.from, raw_date
                    ),
                )
            })?;
            values.push(value);
        }

        Ok((period, native, values))
    }
}

/// Read a JSON cell as an optional number.
///
/// Gap markers and non-finite text such as `"NaN"` or `"inf"` read as missing.
/// Returns `None` for a value that is neither numeric nor a recognized gap marker.
pub fn parse_cell(cell: &Value) -> Option<Option<f64>> {
    let value = match cell {
        Value::Null => return Some(None),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if matches!(trimmed, "" | "." | "NA" | "N/A" | "n.a." | "-") {
                return Some(None);
            }
            trimmed.replace(',', "").parse::<f64>().ok()?
        }
        _ => return None,
    };
    Some(Some(value).filter(|v| v.is_finite()))
}
