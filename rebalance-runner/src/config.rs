//! Serializable run configuration.
//!
//! A run is described by one TOML file:
//!
//! ```toml
//! [simulation]
//! initial_money = 100000000.0
//! trade_ratio = 0.95
//! buy_cost = 0.0015
//! sell_cost = 0.0015
//!
//! [data]
//! weights = "weights.csv"
//! prices = "prices.csv"
//! benchmark = "benchmark.csv"
//!
//! [output]
//! dir = "output"
//! format = "parquet"
//! ```
//!
//! Relative data paths are resolved against the directory of the config file.

use rebalance_core::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid simulation settings: {0}")]
    Invalid(String),

    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Full configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// `date,instrument,weight`
    pub weights: PathBuf,
    /// `date,instrument,open,close,tradable,delisted`
    pub prices: PathBuf,
    /// `date,close`
    #[serde(default)]
    pub benchmark: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    /// CSV plus Parquet copies of the value series.
    Parquet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            format: OutputFormat::Csv,
        }
    }
}

impl RunnerConfig {
    /// Parse and validate a TOML document. Paths are kept as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file and resolve its relative paths against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate().map_err(ConfigError::Invalid)
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data.weights);
        resolve(&mut self.data.prices);
        if let Some(b) = self.data.benchmark.as_mut() {
            resolve(b);
        }
        resolve(&mut self.output.dir);
    }

    /// Deterministic hash of the whole configuration. Two runs with identical
    /// configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        fingerprint(self)
    }
}

/// BLAKE3 hex digest of a value's JSON form.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<RunId, ConfigError> {
    let json = serde_json::to_string(value)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [data]
        weights = "w.csv"
        prices = "p.csv"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = RunnerConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.simulation, SimulationConfig::default());
        assert_eq!(cfg.output.format, OutputFormat::Csv);
        assert_eq!(cfg.output.dir, PathBuf::from("output"));
        assert!(cfg.data.benchmark.is_none());
    }

    #[test]
    fn full_config_parses() {
        let cfg = RunnerConfig::from_toml(
            r#"
            [simulation]
            initial_money = 1000000.0
            trade_ratio = 1.0
            buy_cost = 0.001
            lot_size = 1.0
            start = "2024-01-02"
            buy_allocation = "plan_order"

            [data]
            weights = "w.csv"
            prices = "p.csv"
            benchmark = "b.csv"

            [output]
            dir = "out"
            format = "parquet"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.simulation.initial_money, 1_000_000.0);
        assert_eq!(cfg.simulation.sell_cost, 0.0015);
        assert_eq!(
            cfg.simulation.start,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(
            cfg.simulation.buy_allocation,
            rebalance_core::engine::BuyAllocation::PlanOrder
        );
        assert_eq!(cfg.output.format, OutputFormat::Parquet);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = RunnerConfig::from_toml(&format!("[simulation]\ntrade_ratio = 2.0\n{MINIMAL}"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn run_id_is_stable_and_config_sensitive() {
        let a = RunnerConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.simulation.buy_cost = 0.002;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
        assert_eq!(a.run_id().unwrap().len(), 64);
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut cfg = RunnerConfig::from_toml(MINIMAL).unwrap();
        cfg.resolve_paths(Path::new("/data/run"));
        assert_eq!(cfg.data.weights, PathBuf::from("/data/run/w.csv"));
        assert_eq!(cfg.output.dir, PathBuf::from("/data/run/output"));
    }
}
