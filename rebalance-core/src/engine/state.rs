//! Per-day simulation state and the read-only market view for one session.

use chrono::NaiveDate;

use crate::data::MarketData;
use crate::numeric::nan_sum;

/// Which transition applies to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    /// First session of the window. Trades only if it is also a rebalance date.
    Day0 { rebalance: bool },
    /// No trading; holdings and cash carry forward, delistings still resolve.
    HoldDay,
    /// Carry forward, resolve delistings, plan and execute trades.
    RebalanceDay,
}

impl DayKind {
    pub fn classify(day: usize, is_rebalance: bool) -> Self {
        match (day, is_rebalance) {
            (0, rebalance) => DayKind::Day0 { rebalance },
            (_, true) => DayKind::RebalanceDay,
            (_, false) => DayKind::HoldDay,
        }
    }

    pub fn trades(&self) -> bool {
        matches!(
            self,
            DayKind::Day0 { rebalance: true } | DayKind::RebalanceDay
        )
    }
}

/// Ledger state at the end of a session.
///
/// The loop never mutates a committed context: each session starts from a
/// clone of the previous one and the result replaces it once the whole day
/// has been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationContext {
    /// Session index within the simulation window.
    pub day: usize,
    pub cash: f64,
    /// Realized signed lot volumes, one per instrument.
    pub realized: Vec<f64>,
    /// Latest projected lot volumes (the target-by-volume view).
    pub target_volume: Vec<f64>,
}

impl SimulationContext {
    pub fn seed(width: usize, cash: f64) -> Self {
        Self {
            day: 0,
            cash,
            realized: vec![0.0; width],
            target_volume: vec![0.0; width],
        }
    }

    /// Start of the next session: everything carries over unchanged.
    pub fn carry_forward(&self) -> Self {
        Self {
            day: self.day + 1,
            ..self.clone()
        }
    }

    pub fn holding_count(&self) -> usize {
        self.realized.iter().filter(|v| **v != 0.0).count()
    }
}

/// Market data for one session, plus the previous session where one exists.
#[derive(Debug, Clone, Copy)]
pub struct DayView<'a> {
    pub date: NaiveDate,
    pub open: &'a [f64],
    pub close: &'a [f64],
    pub tradable: &'a [bool],
    pub delisted: &'a [bool],
    pub prev_close: Option<&'a [f64]>,
}

impl<'a> DayView<'a> {
    /// View of panel row `t`.
    pub fn new(market: &'a MarketData, t: usize) -> Self {
        let prev = t.checked_sub(1);
        Self {
            date: market.dates()[t],
            open: market.open(t),
            close: market.close(t),
            tradable: market.tradable(t),
            delisted: market.delisted(t),
            prev_close: prev.map(|p| market.close(p)),
        }
    }

    /// Tradable, still listed and priced at the open.
    pub fn can_trade(&self, c: usize) -> bool {
        let open = self.open[c];
        self.tradable[c] && !self.delisted[c] && open.is_finite() && open > 0.0
    }

    /// Notional of `volumes` at today's open. Missing prices count as zero.
    pub fn value_at_open(&self, volumes: &[f64], lot_size: f64) -> f64 {
        nan_sum(
            volumes
                .iter()
                .zip(self.open)
                .map(|(v, p)| v * p * lot_size),
        )
    }

    /// Notional of the tradable part of `volumes` at today's open.
    pub fn tradable_value_at_open(&self, volumes: &[f64], lot_size: f64) -> f64 {
        nan_sum(
            volumes
                .iter()
                .enumerate()
                .filter(|(c, _)| self.can_trade(*c))
                .map(|(c, v)| v * self.open[c] * lot_size),
        )
    }
}
