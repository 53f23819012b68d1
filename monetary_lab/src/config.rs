//! Pipeline configuration
//!
//! Everything that is a domain judgment rather than logic lives here: the
//! pinned sources, which series make up which table, the balance-sheet
//! grouping and labels, and the predictor subsets of each model.

use crate::derive::{BalanceSheetLayout, Transform};
use crate::error::{LabError, Result};
use crate::loader::SourceSpec;
use crate::merge::Suffixes;
use crate::models::{LassoCvSettings, ModelKind, ModelSpec};
use crate::period::{normalize, Granularity, Period};
use crate::utils::cutoff_for_ratio;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Replay saved responses from `<offline_dir>/<source>.json` instead of fetching
    #[serde(default)]
    pub offline_dir: Option<PathBuf>,
    #[serde(default)]
    pub merge: MergeConfig,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
    #[serde(default)]
    pub balance_sheet: Option<BalanceSheetConfig>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_key() -> String {
    crate::data::TimeTable::DEFAULT_KEY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub suffixes: Suffixes,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            suffixes: Suffixes::default(),
        }
    }
}

/// An analysis table: its member series in merge order
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub members: Vec<String>,
}

/// A transform bound to the table it rewrites
#[derive(Debug, Clone, Deserialize)]
pub struct TransformStep {
    pub table: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSheetConfig {
    pub table: String,
    #[serde(flatten)]
    pub layout: BalanceSheetLayout,
}

fn default_estimators() -> Vec<ModelKind> {
    vec![ModelKind::Ols, ModelKind::Lasso]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub table: String,
    pub response: String,
    #[serde(default)]
    pub horizon: i32,
    /// Explicit predictors; when empty, `include`/`exclude` filter the table columns
    #[serde(default)]
    pub predictors: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_estimators")]
    pub estimators: Vec<ModelKind>,
}

impl ModelConfig {
    pub fn spec(&self) -> ModelSpec {
        let spec = if self.predictors.is_empty() {
            ModelSpec::filtered(&self.response, self.include.clone(), self.exclude.clone())
        } else {
            ModelSpec::new(&self.response, self.predictors.clone())
        };
        spec.with_horizon(self.horizon)
    }
}

/// Cross validation settings and the out-of-sample split
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationConfig {
    #[serde(flatten)]
    pub lasso: LassoCvSettings,
    /// First period of the test partition, in any supported date layout
    #[serde(default)]
    pub cutoff: Option<String>,
    /// Share of the latest rows held out when no cutoff is given
    #[serde(default)]
    pub test_ratio: Option<f64>,
}

impl EvaluationConfig {
    /// Test cutoff for a design over `periods`, if out-of-sample evaluation is configured
    pub fn cutoff_for(&self, periods: &[Period], granularity: Granularity) -> Result<Option<Period>> {
        match (&self.cutoff, self.test_ratio) {
            (Some(raw), _) => normalize(raw, granularity).map(Some),
            (None, Some(ratio)) => cutoff_for_ratio(periods, ratio).map(Some),
            (None, None) => Ok(None),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LabError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| LabError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn source(&self, name: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(LabError::Config("at least one source is required".to_string()));
        }
        unique("source", self.sources.iter().map(|s| s.name.as_str()))?;
        unique("table", self.tables.iter().map(|t| t.name.as_str()))?;
        unique("model", self.models.iter().map(|m| m.name.as_str()))?;

        for source in &self.sources {
            if source.fields.is_empty() {
                return Err(LabError::Config(format!(
                    "source '{}' selects no fields",
                    source.name
                )));
            }
        }

        let tables: HashSet<&str> = self.tables.iter().map(|t| t.name.as_str()).collect();
        for table in &self.tables {
            if table.members.is_empty() {
                return Err(LabError::Config(format!("table '{}' has no members", table.name)));
            }
            if let Some(missing) = table.members.iter().find(|m| self.source(m).is_none()) {
                return Err(LabError::Config(format!(
                    "table '{}' references unknown source '{}'",
                    table.name, missing
                )));
            }
        }

        let known_table = |kind: &str, table: &str| {
            if tables.contains(table) {
                Ok(())
            } else {
                Err(LabError::Config(format!("{} references unknown table '{}'", kind, table)))
            }
        };
        for step in &self.transforms {
            known_table("transform", &step.table)?;
        }
        if let Some(balance_sheet) = &self.balance_sheet {
            known_table("balance_sheet", &balance_sheet.table)?;
        }
        for model in &self.models {
            known_table(&format!("model '{}'", model.name), &model.table)?;
            if !model.predictors.is_empty() && !(model.include.is_empty() && model.exclude.is_empty()) {
                return Err(LabError::Config(format!(
                    "model '{}' sets both predictors and include/exclude filters",
                    model.name
                )));
            }
            if model.estimators.is_empty() {
                return Err(LabError::Config(format!("model '{}' has no estimators", model.name)));
            }
        }

        let evaluation = &self.evaluation;
        if evaluation.cutoff.is_some() && evaluation.test_ratio.is_some() {
            return Err(LabError::Config(
                "evaluation sets both cutoff and test_ratio".to_string(),
            ));
        }
        if let Some(raw) = &evaluation.cutoff {
            normalize(raw, Granularity::Daily)
                .map_err(|e| LabError::Config(format!("evaluation.cutoff: {}", e)))?;
        }
        if evaluation.lasso.folds < 2 {
            return Err(LabError::Config(format!(
                "evaluation.folds must be at least 2, got {}",
                evaluation.lasso.folds
            )));
        }
        Ok(())
    }
}

fn unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(LabError::Config(format!("duplicate {} name '{}'", kind, name)));
        }
    }
    Ok(())
}
