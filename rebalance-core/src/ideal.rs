//! Ideal-world reference returns.
//!
//! A frictionless baseline computed straight from weights and close-to-close
//! returns: no lots, no cash, no tradability. Session `t` earns the
//! close-to-close return from `t - 1` to `t` on the weight row of session `t`
//! itself, and an optional flat cost is charged on `|w[t] - w[t-1]|`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::MarketData;
use crate::domain::HoldingMatrix;
use crate::engine::Backtest;
use crate::numeric::nan_sum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealWorldSeries {
    pub dates: Vec<NaiveDate>,
    /// Net portfolio return per date; zero on the first.
    pub portfolio_return: Vec<f64>,
    /// Running product of `1 + return`, starting at `1 + return[0]`.
    pub cumulative_value: Vec<f64>,
    /// `ln(value[t] / value[t-1])`; zero on the first date.
    pub log_return: Vec<f64>,
}

impl IdealWorldSeries {
    pub fn final_value(&self) -> f64 {
        self.cumulative_value.last().copied().unwrap_or(1.0)
    }
}

/// Ideal-world returns of `weights` priced on `market` closes.
///
/// Closes are looked up on the weight dates; a date missing from the market
/// or a missing close contributes no return for that instrument.
pub fn ideal_world_backtest(
    weights: &HoldingMatrix,
    market: &MarketData,
    trading_cost: f64,
) -> IdealWorldSeries {
    let columns: Vec<Option<usize>> = weights
        .universe()
        .ids()
        .iter()
        .map(|id| market.universe().get(id))
        .collect();
    let closes: Vec<Vec<f64>> = weights
        .dates()
        .iter()
        .map(|d| match market.position_of(*d) {
            Some(t) => {
                let row = market.close(t);
                columns.iter().map(|c| c.map_or(f64::NAN, |c| row[c])).collect()
            }
            None => vec![f64::NAN; columns.len()],
        })
        .collect();

    let n = weights.len();
    let mut portfolio_return = Vec::with_capacity(n);
    for t in 0..n {
        if t == 0 {
            portfolio_return.push(0.0);
            continue;
        }
        let held = weights.row(t);
        let gross = nan_sum(
            held.iter()
                .zip(closes[t].iter().zip(&closes[t - 1]))
                .map(|(w, (now, before))| w * (now / before - 1.0)),
        );
        let cost = if trading_cost != 0.0 {
            nan_sum(
                held.iter()
                    .zip(weights.row(t - 1))
                    .map(|(now, before)| (now - before).abs() * trading_cost),
            )
        } else {
            0.0
        };
        portfolio_return.push(gross - cost);
    }

    let mut cumulative_value = Vec::with_capacity(n);
    let mut value = 1.0;
    for r in &portfolio_return {
        value *= 1.0 + r;
        cumulative_value.push(value);
    }

    let mut log_return = vec![0.0; n.min(1)];
    log_return.extend(cumulative_value.windows(2).map(|w| (w[1] / w[0]).ln()));

    IdealWorldSeries {
        dates: weights.dates().to_vec(),
        portfolio_return,
        cumulative_value,
        log_return,
    }
}

impl Backtest {
    /// Ideal-world reference for this backtest's daily target over its window.
    pub fn ideal_world(&self, trading_cost: f64) -> IdealWorldSeries {
        ideal_world_backtest(&self.daily_target, &self.panel, trading_cost)
    }
}
