//! Run the configured pipeline and write its CSV artifacts.
//!
//! Usage: `run_pipeline <config.toml> [output_dir]`

use anyhow::{bail, Context, Result};
use monetary_lab::loader::{FileSource, HttpSource, SeriesSource};
use monetary_lab::{pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: run_pipeline <config.toml> [output_dir]");
    };
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "output".to_string()));

    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let source: Box<dyn SeriesSource> = match &config.offline_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "replaying saved responses");
            Box::new(FileSource::new(dir))
        }
        None => Box::new(HttpSource::new().context("failed to create HTTP client")?),
    };

    let output = pipeline::run(&config, source.as_ref()).context("pipeline run failed")?;
    let written = output
        .write_csv(&output_dir)
        .with_context(|| format!("failed to write artifacts to {}", output_dir.display()))?;

    for line in output.summary() {
        tracing::info!(
            model = %line.model,
            estimator = %line.estimator,
            n_obs = line.n_obs,
            penalty = line.penalty,
            r_squared = line.r_squared,
            test_r_squared = ?line.test_r_squared,
            "summary"
        );
    }
    for run in &output.runs {
        println!("{}\n", run.full_sample);
    }
    println!("wrote {} files to {}", written.len(), output_dir.display());
    Ok(())
}
