//! Trade executor: turns projected volumes into realized trades.
//!
//! The plan is `projected - tradable realized`: positive entries are buys,
//! negative entries sells. Sells run first at today's open and their proceeds
//! (net of sell cost) fund the buys. Buys are sized from the cash actually
//! on hand after selling, so the buy cost can never push cash below zero.

use serde::{Deserialize, Serialize};

use crate::numeric::nan_sum;

use super::cost_model::CostModel;
use super::state::{DayView, SimulationContext};

/// How post-sell cash is shared between the planned buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyAllocation {
    /// Every buy gets the share of cash its planned value has in the total
    /// buy plan. Shortfalls are spread proportionally across all names.
    #[default]
    ProRata,
    /// Largest planned buys fill first, each up to its planned volume, until
    /// the cash runs out.
    PlanOrder,
}

/// What happened in one execution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub sell_value: f64,
    pub buy_value: f64,
    pub sells: usize,
    pub buys: usize,
}

/// Signed trade plan in lots. Untradable holdings are masked out, so they are
/// never sold.
pub fn trade_plan(projected: &[f64], realized: &[f64], day: &DayView<'_>) -> Vec<f64> {
    projected
        .iter()
        .zip(realized)
        .enumerate()
        .map(|(c, (p, r))| if day.can_trade(c) { p - r } else { 0.0 })
        .collect()
}

/// Execute the plan against `ctx`, mutating its realized volumes and cash.
pub fn execute(
    ctx: &mut SimulationContext,
    projected: &[f64],
    day: &DayView<'_>,
    cost: &CostModel,
    lot_size: f64,
    allocation: BuyAllocation,
) -> Execution {
    let plan = trade_plan(projected, &ctx.realized, day);
    let mut out = Execution::default();

    // Sell leg: every negative entry in full, at the open.
    let sells: Vec<(usize, f64)> = plan
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < 0.0)
        .map(|(c, v)| (c, -v))
        .collect();
    if !sells.is_empty() {
        out.sell_value = nan_sum(sells.iter().map(|(c, v)| v * day.open[*c] * lot_size));
        ctx.cash += cost.sell_proceeds(out.sell_value);
        for (c, v) in &sells {
            ctx.realized[*c] -= v;
        }
        out.sells = sells.len();
    }

    // Buy leg: size against the cash left after selling.
    let buys: Vec<(usize, f64)> = plan
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .map(|(c, v)| (c, *v))
        .collect();
    if !buys.is_empty() {
        let filled = match allocation {
            BuyAllocation::ProRata => allocate_pro_rata(&buys, ctx.cash, day, cost, lot_size),
            BuyAllocation::PlanOrder => allocate_plan_order(&buys, ctx.cash, day, cost, lot_size),
        };
        out.buy_value = nan_sum(filled.iter().map(|(c, v)| v * day.open[*c] * lot_size));
        ctx.cash -= cost.buy_outlay(out.buy_value);
        for (c, v) in &filled {
            ctx.realized[*c] += v;
        }
        out.buys = filled.iter().filter(|(_, v)| *v > 0.0).count();
    }

    out
}

/// Real lots bought per planned buy: `floor(cash * share / (1 + buy_rate) / (open * lot))`
/// where `share` is the instrument's fraction of the total planned buy value.
fn allocate_pro_rata(
    buys: &[(usize, f64)],
    cash: f64,
    day: &DayView<'_>,
    cost: &CostModel,
    lot_size: f64,
) -> Vec<(usize, f64)> {
    let planned: Vec<f64> = buys
        .iter()
        .map(|(c, v)| v * day.open[*c] * lot_size)
        .collect();
    let total: f64 = planned.iter().sum();
    let budget = cost.affordable_notional(cash.max(0.0));
    if total <= 0.0 || budget <= 0.0 {
        return buys.iter().map(|(c, _)| (*c, 0.0)).collect();
    }

    buys.iter()
        .zip(&planned)
        .map(|((c, _), value)| {
            let lot_price = day.open[*c] * lot_size;
            (*c, (budget * (value / total) / lot_price).floor())
        })
        .collect()
}

/// Fill the largest planned buys first, each capped at its planned volume.
fn allocate_plan_order(
    buys: &[(usize, f64)],
    cash: f64,
    day: &DayView<'_>,
    cost: &CostModel,
    lot_size: f64,
) -> Vec<(usize, f64)> {
    let mut order: Vec<(usize, f64, f64)> = buys
        .iter()
        .map(|(c, v)| (*c, *v, v * day.open[*c] * lot_size))
        .collect();
    order.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut budget = cost.affordable_notional(cash.max(0.0));
    let mut filled = Vec::with_capacity(order.len());
    for (c, planned, _) in order {
        let lot_price = day.open[c] * lot_size;
        let lots = planned.min((budget / lot_price).floor()).max(0.0);
        budget -= lots * lot_price;
        filled.push((c, lots));
    }
    filled.sort_by_key(|(c, _)| *c);
    filled
}
