//! Tradability advisories.
//!
//! Observational only: an advisory is logged and collected into the outcome,
//! it never changes what the simulator does.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{InstrumentId, Universe};
use crate::numeric::{nan_sum, safe_ratio, treat_missing_as_zero};

use super::state::DayView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// The target row puts weight on instruments that cannot trade today.
    /// Those names are dropped from the day's plan.
    UntradableTarget,
    /// Part of the current book cannot trade today and stays where it is,
    /// so the realized book drifts from the target.
    StrandedHolding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub date: NaiveDate,
    pub kind: AdvisoryKind,
    /// Aggregate weight of the offending instruments.
    pub total_weight: f64,
    /// Per-instrument breakdown.
    pub instruments: Vec<(InstrumentId, f64)>,
}

/// Target weight assigned to instruments that cannot trade today.
pub fn check_untradable_target(
    target: &[f64],
    day: &DayView<'_>,
    universe: &Universe,
    threshold: f64,
) -> Option<Advisory> {
    let offending = offending(target, day, universe);
    report(AdvisoryKind::UntradableTarget, day.date, offending, threshold)
}

/// Share of the current book, valued at today's open, sitting in instruments
/// that cannot trade today.
pub fn check_stranded_holdings(
    realized: &[f64],
    day: &DayView<'_>,
    universe: &Universe,
    threshold: f64,
) -> Option<Advisory> {
    let values: Vec<f64> = realized
        .iter()
        .zip(day.open)
        .map(|(v, p)| treat_missing_as_zero(v * p))
        .collect();
    let total = nan_sum(values.iter().copied());
    let weights: Vec<f64> = values.iter().map(|v| safe_ratio(*v, total)).collect();
    let offending = offending(&weights, day, universe);
    report(AdvisoryKind::StrandedHolding, day.date, offending, threshold)
}

fn offending(weights: &[f64], day: &DayView<'_>, universe: &Universe) -> Vec<(InstrumentId, f64)> {
    weights
        .iter()
        .enumerate()
        .filter(|(c, w)| **w != 0.0 && !day.can_trade(*c))
        .map(|(c, w)| (universe.ids()[c].clone(), *w))
        .collect()
}

fn report(
    kind: AdvisoryKind,
    date: NaiveDate,
    instruments: Vec<(InstrumentId, f64)>,
    threshold: f64,
) -> Option<Advisory> {
    if instruments.is_empty() {
        return None;
    }
    let total_weight: f64 = instruments.iter().map(|(_, w)| w).sum();
    if total_weight < threshold {
        return None;
    }

    let names: Vec<&str> = instruments.iter().map(|(id, _)| id.as_str()).collect();
    match kind {
        AdvisoryKind::UntradableTarget => warn!(
            %date,
            total_weight,
            instruments = ?names,
            "target portfolio selects instruments that cannot trade; they were dropped from today's plan"
        ),
        AdvisoryKind::StrandedHolding => warn!(
            %date,
            total_weight,
            instruments = ?names,
            "held instruments cannot trade and stay in the book until the next rebalance"
        ),
    }

    Some(Advisory {
        date,
        kind,
        total_weight,
        instruments,
    })
}
