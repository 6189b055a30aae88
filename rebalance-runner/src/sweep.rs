//! Parameter sweeps over cost and deployment settings.
//!
//! The market panel and schedule are loaded once and shared; every grid
//! point is an independent simulation run in parallel with rayon.

use rayon::prelude::*;
use rebalance_core::{Backtest, SimulationConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{fingerprint, RunId};
use crate::runner::RunError;

/// Values to sweep. An empty list keeps the base config's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub buy_costs: Vec<f64>,
    pub sell_costs: Vec<f64>,
    pub trade_ratios: Vec<f64>,
}

impl SweepGrid {
    /// Number of configurations this grid expands to.
    pub fn size(&self) -> usize {
        self.buy_costs.len().max(1) * self.sell_costs.len().max(1) * self.trade_ratios.len().max(1)
    }

    pub fn generate_configs(&self, base: &SimulationConfig) -> Vec<SimulationConfig> {
        let or_base = |values: &[f64], base: f64| {
            if values.is_empty() {
                vec![base]
            } else {
                values.to_vec()
            }
        };
        let buys = or_base(&self.buy_costs, base.buy_cost);
        let sells = or_base(&self.sell_costs, base.sell_cost);
        let ratios = or_base(&self.trade_ratios, base.trade_ratio);

        let mut configs = Vec::with_capacity(self.size());
        for &buy_cost in &buys {
            for &sell_cost in &sells {
                for &trade_ratio in &ratios {
                    configs.push(SimulationConfig {
                        buy_cost,
                        sell_cost,
                        trade_ratio,
                        ..base.clone()
                    });
                }
            }
        }
        configs
    }
}

/// One grid point's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub run_id: RunId,
    pub buy_cost: f64,
    pub sell_cost: f64,
    pub trade_ratio: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub total_cost: f64,
    pub total_trading_value: f64,
}

/// Run every grid point against `base`'s schedule and market.
///
/// Results are ordered by final account value, best first.
pub fn run_sweep(base: &Backtest, grid: &SweepGrid) -> Result<Vec<SweepEntry>, RunError> {
    let configs = grid.generate_configs(base.config());
    info!(points = configs.len(), "starting sweep");

    let mut entries = configs
        .par_iter()
        .map(|config| -> Result<SweepEntry, RunError> {
            let outcome = base.with_config(config.clone())?.run();
            Ok(SweepEntry {
                run_id: fingerprint(config)?,
                buy_cost: config.buy_cost,
                sell_cost: config.sell_cost,
                trade_ratio: config.trade_ratio,
                final_value: outcome.final_value(),
                total_return: outcome.total_return(),
                total_cost: outcome.total_cost(),
                total_trading_value: outcome.total_trading_value(),
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    entries.sort_by(|a, b| b.final_value.total_cmp(&a.final_value));
    if let Some(best) = entries.first() {
        info!(
            best_final_value = best.final_value,
            buy_cost = best.buy_cost,
            sell_cost = best.sell_cost,
            trade_ratio = best.trade_ratio,
            "sweep finished"
        );
    }
    Ok(entries)
}
