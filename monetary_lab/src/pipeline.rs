//! Pipeline stages
//!
//! Each stage takes the immutable output of the previous one and returns a
//! new value: series by source name, analysis tables by table name, the
//! balance-sheet view, then one [`ModelRun`] per configured model and
//! estimator.

use crate::config::{ModelConfig, PipelineConfig};
use crate::data::{AnalysisTable, DisplayTable, Series};
use crate::derive::{apply_transforms, present_balance_sheet};
use crate::error::{LabError, Result};
use crate::export::{
    write_coefficients_csv, write_long_csv, write_predictions_csv, write_records_csv,
    write_table_csv,
};
use crate::loader::{SeriesLoader, SeriesSource};
use crate::merge::merge_all;
use crate::metrics::{evaluate_in_sample, evaluate_out_of_sample, EvaluationResult, OutOfSampleReport};
use crate::models::{build_design, Estimator, FittedModel, LassoCv, ModelKind, Ols, RegressionModel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fit and scores of one estimator on one model spec
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub model: String,
    pub kind: ModelKind,
    /// Fit on every usable row
    pub full_sample: FittedModel,
    pub in_sample: EvaluationResult,
    /// Fit before the cutoff, scored after it
    pub out_of_sample: Option<OutOfSampleReport>,
}

/// One line of the run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub model: String,
    pub estimator: String,
    pub n_obs: usize,
    pub penalty: f64,
    pub r_squared: f64,
    pub train_r_squared: Option<f64>,
    pub test_r_squared: Option<f64>,
    pub test_n: Option<usize>,
}

impl From<&ModelRun> for RunSummary {
    fn from(run: &ModelRun) -> Self {
        let report = run.out_of_sample.as_ref();
        Self {
            model: run.model.clone(),
            estimator: run.kind.to_string(),
            n_obs: run.in_sample.n,
            penalty: run.full_sample.penalty(),
            r_squared: run.in_sample.r_squared,
            train_r_squared: report.map(|r| r.in_sample.r_squared),
            test_r_squared: report.map(|r| r.out_of_sample.r_squared),
            test_n: report.map(|r| r.out_of_sample.n),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub series: BTreeMap<String, Series>,
    pub tables: BTreeMap<String, AnalysisTable>,
    pub balance_sheet: Option<DisplayTable>,
    pub runs: Vec<ModelRun>,
}

impl PipelineOutput {
    pub fn summary(&self) -> Vec<RunSummary> {
        self.runs.iter().map(RunSummary::from).collect()
    }

    /// Write every artifact as CSV under `dir`, returning the written paths
    pub fn write_csv(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        for (name, table) in &self.tables {
            let path = dir.join(format!("table_{}.csv", name));
            write_table_csv(table, &path)?;
            written.push(path);

            let path = dir.join(format!("table_{}_long.csv", name));
            write_long_csv(&table.to_long(), &path)?;
            written.push(path);
        }
        if let Some(view) = &self.balance_sheet {
            let path = dir.join("balance_sheet_long.csv");
            write_long_csv(&view.to_long(), &path)?;
            written.push(path);
        }
        for run in &self.runs {
            let stem = format!("{}_{}", run.model, run.kind.to_string().to_lowercase());

            let path = dir.join(format!("{}_coefficients.csv", stem));
            write_coefficients_csv(&run.full_sample, &path)?;
            written.push(path);

            let path = dir.join(format!("{}_fitted.csv", stem));
            write_predictions_csv(&run.in_sample, &path)?;
            written.push(path);

            if let Some(report) = &run.out_of_sample {
                let path = dir.join(format!("{}_test_predictions.csv", stem));
                write_predictions_csv(&report.out_of_sample, &path)?;
                written.push(path);
            }
        }

        let path = dir.join("summary.csv");
        write_records_csv(&self.summary(), &path)?;
        written.push(path);

        info!(dir = %dir.display(), files = written.len(), "artifacts written");
        Ok(written)
    }
}

/// Load every configured source
pub fn load_sources(config: &PipelineConfig, source: &dyn SeriesSource) -> Result<BTreeMap<String, Series>> {
    let series = SeriesLoader::load_all(source, &config.sources)?;
    Ok(series
        .into_iter()
        .map(|s| (s.name().to_string(), s))
        .collect())
}

/// Merge the member series of every table, then apply that table's transforms
pub fn build_tables(
    config: &PipelineConfig,
    series: &BTreeMap<String, Series>,
) -> Result<BTreeMap<String, AnalysisTable>> {
    let mut tables = BTreeMap::new();
    for table in &config.tables {
        let members = table
            .members
            .iter()
            .map(|name| {
                series
                    .get(name)
                    .cloned()
                    .ok_or_else(|| LabError::unavailable(name, "series was not loaded"))
            })
            .collect::<Result<Vec<_>>>()?;

        let merged = merge_all(&members, &config.merge.key, &config.merge.suffixes)?;
        let transforms: Vec<_> = config
            .transforms
            .iter()
            .filter(|step| step.table == table.name)
            .map(|step| step.transform.clone())
            .collect();
        let derived = apply_transforms(merged, &transforms)?;
        if derived.is_empty() {
            warn!(table = %table.name, "analysis table has no rows");
        }
        tables.insert(table.name.clone(), derived);
    }
    Ok(tables)
}

/// Balance-sheet view, when configured
pub fn present(
    config: &PipelineConfig,
    tables: &BTreeMap<String, AnalysisTable>,
) -> Result<Option<DisplayTable>> {
    config
        .balance_sheet
        .as_ref()
        .map(|bs| present_balance_sheet(lookup(tables, &bs.table)?, &bs.layout))
        .transpose()
}

/// Build the estimator for `kind` from the evaluation settings
pub fn estimator_for(config: &PipelineConfig, kind: ModelKind) -> Result<Estimator> {
    Ok(match kind {
        ModelKind::Ols => Estimator::Ols(Ols::new()),
        ModelKind::Lasso => Estimator::Lasso(LassoCv::new(config.evaluation.lasso.clone())?),
    })
}

/// Fit one configured model with each of its estimators
pub fn run_model(
    config: &PipelineConfig,
    model: &ModelConfig,
    tables: &BTreeMap<String, AnalysisTable>,
) -> Result<Vec<ModelRun>> {
    let table = lookup(tables, &model.table)?;
    let design = build_design(table, &model.spec())?;
    let cutoff = config
        .evaluation
        .cutoff_for(design.periods(), table.granularity())?;

    let mut runs = Vec::with_capacity(model.estimators.len());
    for kind in &model.estimators {
        let estimator = estimator_for(config, *kind)?;
        let full_sample = estimator.fit(&design)?;
        let in_sample = evaluate_in_sample(&full_sample, &design)?;
        let out_of_sample = cutoff
            .map(|cutoff| evaluate_out_of_sample(&design, cutoff, &estimator))
            .transpose()?;

        info!(
            model = %model.name,
            estimator = estimator.name(),
            n_obs = design.len(),
            r_squared = in_sample.r_squared,
            "model fitted"
        );
        runs.push(ModelRun {
            model: model.name.clone(),
            kind: *kind,
            full_sample,
            in_sample,
            out_of_sample,
        });
    }
    Ok(runs)
}

/// Run every stage
pub fn run(config: &PipelineConfig, source: &dyn SeriesSource) -> Result<PipelineOutput> {
    let series = load_sources(config, source)?;
    let tables = build_tables(config, &series)?;
    let balance_sheet = present(config, &tables)?;

    let mut runs = Vec::new();
    for model in &config.models {
        runs.extend(run_model(config, model, &tables)?);
    }

    info!(
        series = series.len(),
        tables = tables.len(),
        runs = runs.len(),
        "pipeline finished"
    );
    Ok(PipelineOutput {
        series,
        tables,
        balance_sheet,
        runs,
    })
}

fn lookup<'a>(tables: &'a BTreeMap<String, AnalysisTable>, name: &str) -> Result<&'a AnalysisTable> {
    tables
        .get(name)
        .ok_or_else(|| LabError::Config(format!("unknown table '{}'", name)))
}
