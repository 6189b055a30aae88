//! Run orchestration: config → data → simulation → artifacts.
//!
//! Entry points:
//! - `prepare()`: loads the data a config names and validates the simulation.
//! - `run_backtest()`: prepares and runs, no I/O beyond reading inputs.
//! - `run_from_config()`: reads a config file, runs, and saves artifacts. Used by the CLI.

use chrono::NaiveDate;
use rebalance_core::{Backtest, BacktestOutcome, SetupError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, RunId, RunnerConfig};
use crate::data_loader::{self, LoadError};
use crate::export::save_artifacts;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),
    #[error("export error: {0:#}")]
    Export(anyhow::Error),
}

/// Headline numbers of one run, persisted as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub sessions: usize,
    pub rebalances: usize,
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub benchmark_return: Option<f64>,
    pub total_cost: f64,
    pub total_trading_value: f64,
    pub trading_sessions: usize,
    pub advisories: usize,
    pub delistings: usize,
}

impl RunSummary {
    pub fn from_outcome(run_id: RunId, outcome: &BacktestOutcome) -> Self {
        let benchmark_return = outcome.benchmark_value.as_ref().and_then(|series| {
            let first = series.first()?.value;
            let last = series.last()?.value;
            Some(rebalance_core::numeric::safe_ratio(last, first) - 1.0)
        });
        Self {
            run_id,
            start: outcome.dates.first().copied().unwrap_or_default(),
            end: outcome.dates.last().copied().unwrap_or_default(),
            sessions: outcome.dates.len(),
            rebalances: outcome.rebalance_dates.len(),
            initial_value: outcome.initial_value(),
            final_value: outcome.final_value(),
            total_return: outcome.total_return(),
            benchmark_return,
            total_cost: outcome.total_cost(),
            total_trading_value: outcome.total_trading_value(),
            trading_sessions: outcome.trading_sessions(),
            advisories: outcome.advisories.len(),
            delistings: outcome.delistings.len(),
        }
    }
}

/// Result of one run, with the artifact directory when artifacts were saved.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    pub outcome: BacktestOutcome,
    pub artifact_dir: Option<PathBuf>,
}

impl RunResult {
    pub fn run_id(&self) -> &str {
        &self.summary.run_id
    }
}

/// Load the data named by `config` and validate the simulation against it.
pub fn prepare(config: &RunnerConfig) -> Result<Backtest, RunError> {
    config.validate()?;
    let data = data_loader::load(&config.data)?;
    Ok(Backtest::new(
        data.weights,
        data.market,
        config.simulation.clone(),
    )?)
}

/// Prepare and run once. Nothing is written.
pub fn run_backtest(config: &RunnerConfig) -> Result<RunResult, RunError> {
    let run_id = config.run_id()?;
    let backtest = prepare(config)?;
    let outcome = backtest.run();
    let summary = RunSummary::from_outcome(run_id, &outcome);

    info!(
        run_id = %summary.run_id,
        final_value = summary.final_value,
        total_return = summary.total_return,
        total_cost = summary.total_cost,
        "run complete"
    );
    Ok(RunResult {
        summary,
        outcome,
        artifact_dir: None,
    })
}

/// Read a config file, run it, and save the artifacts. `output_dir`
/// overrides the directory named in the file.
pub fn run_from_config(path: &Path, output_dir: Option<&Path>) -> Result<RunResult, RunError> {
    let mut config = RunnerConfig::load(path)?;
    if let Some(dir) = output_dir {
        config.output.dir = dir.to_path_buf();
    }

    let mut result = run_backtest(&config)?;
    let dir = save_artifacts(&result.outcome, &result.summary, &config.output)
        .map_err(RunError::Export)?;
    result.artifact_dir = Some(dir);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;

    #[test]
    fn missing_input_file_is_a_data_error() {
        let config = RunnerConfig {
            simulation: Default::default(),
            data: DataConfig {
                weights: PathBuf::from("/nonexistent/weights.csv"),
                prices: PathBuf::from("/nonexistent/prices.csv"),
                benchmark: None,
            },
            output: Default::default(),
        };
        let err = run_backtest(&config).unwrap_err();
        assert!(matches!(err, RunError::Data(LoadError::Io { .. })));
    }

    #[test]
    fn invalid_settings_fail_before_loading() {
        let mut config = RunnerConfig {
            simulation: Default::default(),
            data: DataConfig {
                weights: PathBuf::from("/nonexistent/weights.csv"),
                prices: PathBuf::from("/nonexistent/prices.csv"),
                benchmark: None,
            },
            output: Default::default(),
        };
        config.simulation.lot_size = 0.0;
        let err = prepare(&config).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
    }
}
