//! Cost model: proportional buy and sell friction.
//!
//! Costs are asymmetric per side and expressed as plain rates
//! (`0.0015` = 15 bps). Sellers receive `notional * (1 - sell_rate)`,
//! buyers pay `notional * (1 + buy_rate)`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub buy_rate: f64,
    pub sell_rate: f64,
}

impl CostModel {
    pub fn new(buy_rate: f64, sell_rate: f64) -> Self {
        Self {
            buy_rate,
            sell_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cash credited for selling `notional` worth of stock.
    pub fn sell_proceeds(&self, notional: f64) -> f64 {
        notional * (1.0 - self.sell_rate)
    }

    /// Cash debited for buying `notional` worth of stock.
    pub fn buy_outlay(&self, notional: f64) -> f64 {
        notional * (1.0 + self.buy_rate)
    }

    /// Largest notional that `cash` can buy once the buy cost is added on top.
    pub fn affordable_notional(&self, cash: f64) -> f64 {
        cash / (1.0 + self.buy_rate)
    }

    /// Cash moved by closing a signed position worth `notional` (negative for
    /// shorts). Closing a long sells and pays the sell rate; covering a short
    /// buys back and pays the buy rate. Either way the cost is a deduction.
    pub fn liquidation_cash(&self, notional: f64) -> f64 {
        if notional >= 0.0 {
            self.sell_proceeds(notional)
        } else {
            -self.buy_outlay(-notional)
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(1.5 / 1000.0, 1.5 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_moves_notional_exactly() {
        let cost = CostModel::frictionless();
        assert_eq!(cost.sell_proceeds(1000.0), 1000.0);
        assert_eq!(cost.buy_outlay(1000.0), 1000.0);
        assert_eq!(cost.affordable_notional(1000.0), 1000.0);
    }

    #[test]
    fn sell_cost_reduces_proceeds() {
        let cost = CostModel::new(0.0, 0.01);
        // 10 lots * 8.0 at 1% sell cost
        assert!((cost.sell_proceeds(80.0) - 79.2).abs() < 1e-12);
    }

    #[test]
    fn affordable_notional_covers_buy_cost() {
        let cost = CostModel::new(0.002, 0.0);
        let notional = cost.affordable_notional(10_000.0);
        assert!((cost.buy_outlay(notional) - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn covering_a_short_costs_cash() {
        let cost = CostModel::new(0.01, 0.02);
        assert!((cost.liquidation_cash(100.0) - 98.0).abs() < 1e-12);
        assert!((cost.liquidation_cash(-100.0) + 101.0).abs() < 1e-12);
    }
}
