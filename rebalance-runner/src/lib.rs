//! Rebalance Runner: run orchestration on top of `rebalance-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run ids
//! - CSV loading of weight schedules, price panels and benchmarks
//! - Single-run orchestration with a JSON summary
//! - Artifact export (CSV, JSON, Parquet)
//! - Parallel parameter sweeps over costs and deployment ratio

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, DataConfig, OutputConfig, OutputFormat, RunId, RunnerConfig};
pub use data_loader::{load, LoadError, LoadedData};
pub use export::save_artifacts;
pub use runner::{prepare, run_backtest, run_from_config, RunError, RunResult, RunSummary};
pub use sweep::{run_sweep, SweepEntry, SweepGrid};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
        assert_send::<SweepGrid>();
        assert_sync::<SweepGrid>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<RunResult>();
        assert_sync::<RunResult>();
        assert_send::<SweepEntry>();
        assert_sync::<SweepEntry>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
