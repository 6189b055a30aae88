//! Simulation outcome.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::HoldingMatrix;

use super::advisory::Advisory;
use super::config::SimulationConfig;
use super::delisting::Liquidation;
use super::info::InfoRecord;

/// One point of a value series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Forced close-out recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelistingEvent {
    pub date: NaiveDate,
    pub instrument: String,
    pub volume: f64,
    pub price: f64,
    pub cash: f64,
}

impl DelistingEvent {
    pub(crate) fn new(date: NaiveDate, instrument: String, liq: &Liquidation) -> Self {
        Self {
            date,
            instrument,
            volume: liq.volume,
            price: liq.price,
            cash: liq.cash,
        }
    }
}

/// Everything one simulation run produces.
///
/// `account_value` and `benchmark_value` carry a synthetic first point dated
/// the day before the window starts, so the first return of either series
/// is exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub config: SimulationConfig,
    /// Sessions of the simulation window.
    pub dates: Vec<NaiveDate>,
    /// Rebalance dates inside the window.
    pub rebalance_dates: Vec<NaiveDate>,
    /// Daily target weights (schedule forward-filled onto the window).
    pub target_weights: HoldingMatrix,
    /// Projected lot volumes; refreshed on trading sessions, carried otherwise.
    pub target_volume: HoldingMatrix,
    pub realized_volume: HoldingMatrix,
    /// Realized volume marked at the close, normalized per row.
    pub realized_weights: HoldingMatrix,
    /// End-of-session cash.
    pub cash: Vec<f64>,
    pub account_value: Vec<ValuePoint>,
    pub benchmark_value: Option<Vec<ValuePoint>>,
    pub info: Vec<InfoRecord>,
    pub advisories: Vec<Advisory>,
    pub delistings: Vec<DelistingEvent>,
}

impl BacktestOutcome {
    pub fn final_value(&self) -> f64 {
        self.account_value.last().map_or(0.0, |p| p.value)
    }

    pub fn initial_value(&self) -> f64 {
        self.account_value.first().map_or(0.0, |p| p.value)
    }

    pub fn total_return(&self) -> f64 {
        crate::numeric::safe_ratio(self.final_value(), self.initial_value()) - 1.0
    }

    /// Trading costs paid over the run.
    pub fn total_cost(&self) -> f64 {
        self.info.iter().map(|r| r.friction_value).sum()
    }

    pub fn total_trading_value(&self) -> f64 {
        self.info.iter().map(|r| r.trading_value).sum()
    }

    /// Number of sessions on which at least one trade was executed.
    pub fn trading_sessions(&self) -> usize {
        self.info.iter().filter(|r| r.trading_value > 0.0).count()
    }

    /// Simple returns of the padded account value; the first entry is zero.
    pub fn simple_returns(&self) -> Vec<f64> {
        simple_returns(&self.account_value)
    }

    /// Log returns of the padded account value; the first entry is zero.
    pub fn log_returns(&self) -> Vec<f64> {
        let mut out = vec![0.0];
        out.extend(
            self.account_value
                .windows(2)
                .map(|w| (w[1].value / w[0].value).ln()),
        );
        out
    }

    pub fn benchmark_returns(&self) -> Option<Vec<f64>> {
        self.benchmark_value.as_deref().map(simple_returns)
    }
}

fn simple_returns(series: &[ValuePoint]) -> Vec<f64> {
    let mut out = vec![0.0];
    out.extend(series.windows(2).map(|w| w[1].value / w[0].value - 1.0));
    out
}
