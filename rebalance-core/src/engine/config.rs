//! Simulation configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;
use super::executor::BuyAllocation;

/// Default number of sessions simulated after the last rebalance.
pub const DEFAULT_SETTLEMENT_SESSIONS: usize = 21;

/// Sessions the price tape must extend past the last rebalance when the end
/// date is left to its default.
pub const REQUIRED_TAIL_SESSIONS: usize = 60;

/// Parameters of one simulation run.
///
/// `start`/`end` left as `None` resolve against the rebalance schedule:
/// - start: the first rebalance date (an explicit start earlier than that is
///   moved forward to it)
/// - end: `DEFAULT_SETTLEMENT_SESSIONS` sessions after the last rebalance,
///   provided the tape has `REQUIRED_TAIL_SESSIONS` sessions past it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_money: f64,
    /// Fraction of `initial_money` actually deployed. The rest never enters
    /// the simulated account.
    pub trade_ratio: f64,
    pub buy_cost: f64,
    pub sell_cost: f64,
    /// Carried through for downstream performance calculations.
    pub risk_free_rate: f64,
    /// Shares per lot.
    pub lot_size: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Emit tradability advisories on rebalance days.
    pub warnings: bool,
    pub warning_threshold: f64,
    pub settlement_sessions: usize,
    pub required_tail_sessions: usize,
    pub buy_allocation: BuyAllocation,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_money: 100_000_000.0,
            trade_ratio: 0.95,
            buy_cost: 1.5 / 1000.0,
            sell_cost: 1.5 / 1000.0,
            risk_free_rate: 0.0,
            lot_size: 100.0,
            start: None,
            end: None,
            warnings: true,
            warning_threshold: 0.05,
            settlement_sessions: DEFAULT_SETTLEMENT_SESSIONS,
            required_tail_sessions: REQUIRED_TAIL_SESSIONS,
            buy_allocation: BuyAllocation::ProRata,
        }
    }
}

impl SimulationConfig {
    /// Frictionless config with the given capital and lot size, fully deployed.
    pub fn frictionless(initial_money: f64, lot_size: f64) -> Self {
        Self {
            initial_money,
            trade_ratio: 1.0,
            buy_cost: 0.0,
            sell_cost: 0.0,
            lot_size,
            ..Self::default()
        }
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.buy_cost, self.sell_cost)
    }

    /// Cash the account starts with.
    pub fn seed_cash(&self) -> f64 {
        self.initial_money * self.trade_ratio
    }

    /// Check parameter ranges. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_money.is_finite() && self.initial_money > 0.0) {
            return Err(format!(
                "initial_money must be positive, got {}",
                self.initial_money
            ));
        }
        if !(self.trade_ratio > 0.0 && self.trade_ratio <= 1.0) {
            return Err(format!(
                "trade_ratio must be in (0, 1], got {}",
                self.trade_ratio
            ));
        }
        for (name, rate) in [("buy_cost", self.buy_cost), ("sell_cost", self.sell_cost)] {
            if !(rate.is_finite() && (0.0..1.0).contains(&rate)) {
                return Err(format!("{name} must be in [0, 1), got {rate}"));
            }
        }
        if !(self.lot_size.is_finite() && self.lot_size > 0.0) {
            return Err(format!("lot_size must be positive, got {}", self.lot_size));
        }
        if !(self.warning_threshold.is_finite() && self.warning_threshold >= 0.0) {
            return Err(format!(
                "warning_threshold must be non-negative, got {}",
                self.warning_threshold
            ));
        }
        if let (Some(s), Some(e)) = (self.start, self.end) {
            if e < s {
                return Err(format!("end {e} is before start {s}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_settings() {
        let c = SimulationConfig::default();
        assert_eq!(c.initial_money, 100_000_000.0);
        assert_eq!(c.trade_ratio, 0.95);
        assert_eq!(c.lot_size, 100.0);
        assert_eq!(c.seed_cash(), 95_000_000.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let bad_ratio = SimulationConfig {
            trade_ratio: 1.5,
            ..SimulationConfig::default()
        };
        assert!(bad_ratio.validate().is_err());

        let bad_cost = SimulationConfig {
            sell_cost: -0.01,
            ..SimulationConfig::default()
        };
        assert!(bad_cost.validate().unwrap_err().contains("sell_cost"));

        let inverted = SimulationConfig {
            start: NaiveDate::from_ymd_opt(2024, 2, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..SimulationConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let c: SimulationConfig = serde_json::from_str(r#"{"buy_cost": 0.001}"#).unwrap();
        assert_eq!(c.buy_cost, 0.001);
        assert_eq!(c.sell_cost, 0.0015);
        assert_eq!(c.buy_allocation, BuyAllocation::ProRata);
    }
}
