//! End-of-run derivation: marks, realized weights and value series.

use chrono::{Duration, NaiveDate};

use crate::data::MarketData;
use crate::domain::to_percentage;
use crate::numeric::nan_sum;

use super::result::ValuePoint;

/// Close prices for panel rows `start..=end`, as reported. A missing close
/// stays NaN, so a holding without a close that day is valued at zero.
pub fn mark_prices(panel: &MarketData, start: usize, end: usize) -> Vec<Vec<f64>> {
    (start..=end).map(|t| panel.close(t).to_vec()).collect()
}

/// Book value of `volumes` at `marks`; unpriced positions count as zero.
pub fn book_value(volumes: &[f64], marks: &[f64], lot_size: f64) -> f64 {
    nan_sum(volumes.iter().zip(marks).map(|(v, p)| v * p * lot_size))
}

/// Realized volume marked to close, normalized per row. Flat rows stay zero.
pub fn realized_weights(volumes: &[Vec<f64>], marks: &[Vec<f64>]) -> Vec<Vec<f64>> {
    volumes
        .iter()
        .zip(marks)
        .map(|(vols, px)| {
            let values: Vec<f64> = vols.iter().zip(px).map(|(v, p)| v * p).collect();
            to_percentage(&values)
        })
        .collect()
}

/// Account value per session plus a leading point dated the day before
/// `dates[0]` carrying `seed_cash`.
pub fn account_value(
    dates: &[NaiveDate],
    volumes: &[Vec<f64>],
    cash: &[f64],
    marks: &[Vec<f64>],
    lot_size: f64,
    seed_cash: f64,
) -> Vec<ValuePoint> {
    let mut out = Vec::with_capacity(dates.len() + 1);
    if let Some(first) = dates.first() {
        out.push(ValuePoint {
            date: time_zero(*first),
            value: seed_cash,
        });
    }
    out.extend(
        dates
            .iter()
            .zip(volumes.iter().zip(marks))
            .zip(cash)
            .map(|((date, (vols, px)), cash)| ValuePoint {
                date: *date,
                value: book_value(vols, px, lot_size) + cash,
            }),
    );
    out
}

/// Benchmark closes over the window, padded at time zero with the first
/// available close so its first return is zero.
pub fn benchmark_value(dates: &[NaiveDate], closes: &[f64]) -> Vec<ValuePoint> {
    let base = closes
        .iter()
        .copied()
        .find(|v| v.is_finite())
        .unwrap_or(f64::NAN);
    let mut out = Vec::with_capacity(dates.len() + 1);
    if let Some(first) = dates.first() {
        out.push(ValuePoint {
            date: time_zero(*first),
            value: base,
        });
    }
    out.extend(
        dates
            .iter()
            .zip(closes)
            .map(|(date, value)| ValuePoint {
                date: *date,
                value: *value,
            }),
    );
    out
}

fn time_zero(start: NaiveDate) -> NaiveDate {
    start - Duration::days(1)
}
