//! # Monetary Lab
//!
//! A Rust library for reconciling macro-financial time series and modelling
//! a local interbank rate against the central bank balance sheet.
//!
//! ## Features
//!
//! - Series loading from pinned JSON endpoints, saved files or in-memory payloads
//! - Canonical monthly and daily period keys from heterogeneous date layouts
//! - Sequential inner joins with collision suffixes
//! - Derived fields (forward outright rates, ratios, spreads) and a signed,
//!   relabeled balance-sheet view for stacked-area charts
//! - Design matrices with lead/lag horizons and complete-case omission
//! - OLS with inference statistics and cross-validated LASSO
//! - In-sample and chronological out-of-sample R²
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use monetary_lab::loader::{FileSource, SeriesLoader};
//! use monetary_lab::merge::{merge_all, Suffixes};
//! use monetary_lab::metrics::evaluate_out_of_sample;
//! use monetary_lab::models::{build_design, ModelSpec, Ols};
//! use monetary_lab::{Period, PipelineConfig};
//!
//! # fn main() -> monetary_lab::Result<()> {
//! let config = PipelineConfig::load("config/pipeline.toml")?;
//! let source = FileSource::new("data");
//!
//! // Load and merge
//! let series = SeriesLoader::load_all(&source, &config.sources)?;
//! let table = merge_all(&series, "period", &Suffixes::default())?;
//!
//! // Regress the overnight HIBOR on the aggregate balance, one month ahead
//! let spec = ModelSpec::new("hibor_overnight", vec!["aggregate_balance".to_string()])
//!     .with_horizon(1);
//! let design = build_design(&table, &spec)?;
//!
//! let report = evaluate_out_of_sample(&design, Period::monthly(2022, 1)?, &Ols::new())?;
//! println!("{}", report.model);
//! println!("out-of-sample R²: {:.3}", report.out_of_sample.r_squared);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod export;
pub mod loader;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod period;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::data::{AnalysisTable, DisplayTable, LongRecord, Series, TimeTable};
pub use crate::error::{LabError, Result};
pub use crate::models::{DesignMatrix, FittedModel, ModelSpec, RegressionModel};
pub use crate::period::{Granularity, Period};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
