//! Delisting resolution.
//!
//! Runs at the start of every session after carry-forward, before any
//! planning. A held instrument that is delisted today is closed out at the
//! previous session's close (it no longer trades today), the cost of the
//! closing side is charged, and its realized volume goes to zero.

use tracing::warn;

use crate::numeric::treat_missing_as_zero;

use super::cost_model::CostModel;
use super::state::{DayView, SimulationContext};

/// One forced close-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Liquidation {
    /// Column in the universe.
    pub instrument: usize,
    /// Signed lot volume closed out.
    pub volume: f64,
    /// Previous close used as the exit price. NaN if it was missing.
    pub price: f64,
    /// Cash credited (negative when covering a short).
    pub cash: f64,
}

impl Liquidation {
    /// Signed notional closed out, missing price counted as zero.
    pub fn notional(&self, lot_size: f64) -> f64 {
        self.volume * treat_missing_as_zero(self.price) * lot_size
    }
}

/// Close out every held position that is delisted today.
///
/// A position can only be held and delisted on the session its delisting is
/// first observed: once resolved the volume is zero and can never be bought
/// back, because a delisted instrument is never tradable.
pub fn resolve_delistings(
    ctx: &mut SimulationContext,
    day: &DayView<'_>,
    cost: &CostModel,
    lot_size: f64,
) -> Vec<Liquidation> {
    let mut out = Vec::new();
    for c in 0..ctx.realized.len() {
        let volume = ctx.realized[c];
        if volume == 0.0 || !day.delisted[c] {
            continue;
        }

        let price = day.prev_close.map_or(f64::NAN, |p| p[c]);
        if !price.is_finite() {
            warn!(
                date = %day.date,
                instrument = c,
                volume,
                "delisted holding has no prior close; written off at zero"
            );
        }

        let notional = volume * treat_missing_as_zero(price) * lot_size;
        let cash = cost.liquidation_cash(notional);
        ctx.cash += cash;
        ctx.realized[c] = 0.0;
        out.push(Liquidation {
            instrument: c,
            volume,
            price,
            cash,
        });
    }
    out
}
