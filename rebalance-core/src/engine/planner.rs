//! Trade planner: projected lot volumes for today's target weights.
//!
//! The projection ignores transaction costs. It assumes every tradable
//! holding could be liquidated at today's open and re-spends the proceeds
//! plus idle cash on the tradable part of the target, rescaled to sum to one.
//! Volumes are floored toward zero so a projected position is always
//! affordable at the estimate.

use crate::domain::{to_percentage, LEVERAGE_TOLERANCE};
use crate::numeric::floor_toward_zero;

use super::state::DayView;

/// Cash available for today's target: idle cash plus the tradable holdings
/// marked at the open.
pub fn deployable_cash(realized: &[f64], cash: f64, day: &DayView<'_>, lot_size: f64) -> f64 {
    day.tradable_value_at_open(realized, lot_size) + cash
}

/// Target weights restricted to instruments that can trade today and
/// rescaled to sum to one. Untradable names get zero.
///
/// A restriction whose net weight is not positive (nothing tradable left, or
/// only the short side survives) cannot be expressed as a leveraged-long
/// book, so it is planned as flat.
pub fn tradable_weights(target: &[f64], day: &DayView<'_>) -> Vec<f64> {
    let restricted: Vec<f64> = target
        .iter()
        .enumerate()
        .map(|(c, w)| if day.can_trade(c) { *w } else { 0.0 })
        .collect();

    let net: f64 = restricted.iter().sum();
    if net <= LEVERAGE_TOLERANCE {
        return vec![0.0; target.len()];
    }
    to_percentage(&restricted)
}

/// Projected signed lot volume per instrument over the full universe.
///
/// Instruments that cannot trade today are always zero, so the caller's trade
/// plan never touches them.
pub fn project_volumes(
    target: &[f64],
    realized: &[f64],
    cash: f64,
    day: &DayView<'_>,
    lot_size: f64,
) -> Vec<f64> {
    let budget = deployable_cash(realized, cash, day, lot_size);
    tradable_weights(target, day)
        .iter()
        .enumerate()
        .map(|(c, w)| {
            if *w == 0.0 {
                0.0
            } else {
                floor_toward_zero(budget * w / (day.open[c] * lot_size))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MarketData, MarketDataBuilder, Observation};
    use chrono::NaiveDate;

    fn market(opens: &[(f64, bool)]) -> MarketData {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut b = MarketDataBuilder::new();
        for (i, (open, tradable)) in opens.iter().enumerate() {
            b.observe(
                d,
                format!("S{i}"),
                Observation {
                    open: *open,
                    close: *open,
                    tradable: *tradable,
                    delisted: false,
                },
            );
        }
        b.build().unwrap()
    }

    #[test]
    fn first_day_projection_floors_lots() {
        let m = market(&[(10.0, true), (20.0, true)]);
        let day = DayView::new(&m, 0);
        let proj = project_volumes(&[0.5, 0.5], &[0.0, 0.0], 100.0, &day, 1.0);
        assert_eq!(proj, vec![5.0, 2.0]);
    }

    #[test]
    fn untradable_names_are_excluded_and_weights_rescaled() {
        let m = market(&[(10.0, true), (20.0, false), (10.0, true)]);
        let day = DayView::new(&m, 0);
        let w = tradable_weights(&[0.25, 0.5, 0.25], &day);
        assert_eq!(w, vec![0.5, 0.0, 0.5]);

        // Held untradable lots are not counted as deployable.
        let proj = project_volumes(&[0.25, 0.5, 0.25], &[0.0, 3.0, 0.0], 100.0, &day, 1.0);
        assert_eq!(proj, vec![5.0, 0.0, 5.0]);
    }

    #[test]
    fn deployable_cash_marks_tradable_holdings_at_open() {
        let m = market(&[(10.0, true), (20.0, false)]);
        let day = DayView::new(&m, 0);
        assert_eq!(deployable_cash(&[2.0, 1.0], 5.0, &day, 100.0), 2005.0);
    }

    #[test]
    fn shorts_floor_toward_zero() {
        let m = market(&[(10.0, true), (10.0, true)]);
        let day = DayView::new(&m, 0);
        // weights 1.5 / -0.5 of 105 cash -> 15.75 lots long, -5.25 lots short
        let proj = project_volumes(&[1.5, -0.5], &[0.0, 0.0], 105.0, &day, 1.0);
        assert_eq!(proj, vec![15.0, -5.0]);
    }

    #[test]
    fn short_only_restriction_plans_flat() {
        let m = market(&[(10.0, false), (10.0, true)]);
        let day = DayView::new(&m, 0);
        let proj = project_volumes(&[1.5, -0.5], &[0.0, 0.0], 100.0, &day, 1.0);
        assert_eq!(proj, vec![0.0, 0.0]);
    }
}
