//! Holding matrix: dates × instruments table of weights or lot volumes.
//!
//! The same container carries three roles during a run:
//! - target percentage weights (the strategy's schedule, forward-filled daily)
//! - target lot volumes (the planner's projection)
//! - realized lot volumes and their derived percentage weights
//!
//! Shape is fixed at construction. Rows may be rewritten in place by the
//! engine but never added or removed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::universe::{Universe, UniverseError};
use super::InstrumentId;
use crate::numeric::{nan_sum, safe_ratio};

/// A row summing to at most this value is treated as non-positive leverage.
pub const LEVERAGE_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingKind {
    /// Fraction of deployable capital per instrument.
    Percentage,
    /// Signed lot counts (negative = short).
    Volume,
}

#[derive(Debug, Error, PartialEq)]
pub enum HoldingError {
    #[error("holding matrix has {rows} rows but {dates} dates")]
    RowCount { rows: usize, dates: usize },

    #[error("row {row} has {width} columns, universe has {expected}")]
    RowWidth {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("dates must be strictly ascending (violated at {0})")]
    UnsortedDates(NaiveDate),

    #[error(
        "target weights at {date} sum to {sum}, which is not positive; only fully flat \
         (all-zero) rows may have a non-positive sum"
    )]
    IllegalLeverage { date: NaiveDate, sum: f64 },

    #[error(transparent)]
    Universe(#[from] UniverseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingMatrix {
    kind: HoldingKind,
    dates: Vec<NaiveDate>,
    universe: Universe,
    rows: Vec<Vec<f64>>,
}

impl HoldingMatrix {
    pub fn new(
        kind: HoldingKind,
        dates: Vec<NaiveDate>,
        universe: Universe,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, HoldingError> {
        if rows.len() != dates.len() {
            return Err(HoldingError::RowCount {
                rows: rows.len(),
                dates: dates.len(),
            });
        }
        for w in dates.windows(2) {
            if w[1] <= w[0] {
                return Err(HoldingError::UnsortedDates(w[1]));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != universe.len() {
                return Err(HoldingError::RowWidth {
                    row: i,
                    width: row.len(),
                    expected: universe.len(),
                });
            }
        }
        Ok(Self {
            kind,
            dates,
            universe,
            rows,
        })
    }

    /// A target weight schedule. Enforces the leverage rule: every row is
    /// either entirely zero or sums above [`LEVERAGE_TOLERANCE`].
    pub fn target_weights(
        dates: Vec<NaiveDate>,
        universe: Universe,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, HoldingError> {
        let m = Self::new(HoldingKind::Percentage, dates, universe, rows)?;
        m.check_leverage()?;
        Ok(m)
    }

    /// All-zero matrix of the given shape.
    pub fn zeros(kind: HoldingKind, dates: Vec<NaiveDate>, universe: Universe) -> Self {
        let rows = vec![vec![0.0; universe.len()]; dates.len()];
        Self {
            kind,
            dates,
            universe,
            rows,
        }
    }

    /// Build from long-format `(date, instrument, value)` entries.
    ///
    /// Dates and instruments are sorted; cells without an entry are zero.
    /// A repeated `(date, instrument)` pair keeps the last value.
    pub fn from_entries<I>(kind: HoldingKind, entries: I) -> Result<Self, HoldingError>
    where
        I: IntoIterator<Item = (NaiveDate, InstrumentId, f64)>,
    {
        let mut cells: BTreeMap<(NaiveDate, InstrumentId), f64> = BTreeMap::new();
        let mut ids: BTreeSet<InstrumentId> = BTreeSet::new();
        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        for (date, id, value) in entries {
            ids.insert(id.clone());
            dates.insert(date);
            cells.insert((date, id), value);
        }

        let universe = Universe::new(ids.into_iter().collect())?;
        let dates: Vec<NaiveDate> = dates.into_iter().collect();
        let mut rows = vec![vec![0.0; universe.len()]; dates.len()];
        for ((date, id), value) in cells {
            // Both lookups are total: every key was inserted above.
            let r = dates.binary_search(&date).unwrap_or_default();
            let c = universe.index_of(&id)?;
            rows[r][c] = value;
        }

        let m = Self::new(kind, dates, universe, rows)?;
        if kind == HoldingKind::Percentage {
            m.check_leverage()?;
        }
        Ok(m)
    }

    /// Every row is either flat or sums above [`LEVERAGE_TOLERANCE`].
    pub fn check_leverage(&self) -> Result<(), HoldingError> {
        for (date, row) in self.dates.iter().zip(&self.rows) {
            if !is_legal_weight_row(row) {
                return Err(HoldingError::IllegalLeverage {
                    date: *date,
                    sum: row.iter().sum(),
                });
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> HoldingKind {
        self.kind
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, t: usize) -> &[f64] {
        &self.rows[t]
    }

    pub(crate) fn set_row(&mut self, t: usize, values: &[f64]) {
        self.rows[t].copy_from_slice(values);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn row_for(&self, date: NaiveDate) -> Option<&[f64]> {
        self.position_of(date).map(|t| self.row(t))
    }

    /// Value of one cell by labels.
    pub fn get(&self, date: NaiveDate, id: &str) -> Option<f64> {
        let t = self.position_of(date)?;
        let c = self.universe.get(id)?;
        Some(self.rows[t][c])
    }

    /// Reindex onto `dates`, carrying the latest row dated on or before each
    /// target date. Dates before the first row get an all-zero row.
    pub fn forward_fill_onto(&self, dates: &[NaiveDate]) -> Self {
        let width = self.universe.len();
        let rows = dates
            .iter()
            .map(|d| match self.dates.partition_point(|x| x <= d) {
                0 => vec![0.0; width],
                n => self.rows[n - 1].clone(),
            })
            .collect();
        Self {
            kind: self.kind,
            dates: dates.to_vec(),
            universe: self.universe.clone(),
            rows,
        }
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.rows.iter().map(|r| nan_sum(r.iter().copied())).collect()
    }

    /// Number of non-zero cells per row.
    pub fn nonzero_counts(&self) -> Vec<usize> {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|v| **v != 0.0 && !v.is_nan()).count())
            .collect()
    }

    /// Instruments with a non-zero value on at least one date.
    pub fn ever_held(&self) -> Vec<usize> {
        (0..self.universe.len())
            .filter(|&c| self.rows.iter().any(|r| r[c] != 0.0 && !r[c].is_nan()))
            .collect()
    }
}

/// Leverage rule for a single weight row.
pub fn is_legal_weight_row(row: &[f64]) -> bool {
    row.iter().all(|w| *w == 0.0) || row.iter().sum::<f64>() > LEVERAGE_TOLERANCE
}

/// Rescale a row so it sums to one. A zero-sum row (including an all-zero
/// one) maps to all zeros.
pub fn to_percentage(row: &[f64]) -> Vec<f64> {
    let total = nan_sum(row.iter().copied());
    row.iter().map(|v| safe_ratio(*v, total)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn ab() -> Universe {
        Universe::from_ids(["A", "B"]).unwrap()
    }

    #[test]
    fn leverage_rule_accepts_flat_and_positive_rows() {
        let m = HoldingMatrix::target_weights(
            vec![d(2), d(3), d(4)],
            ab(),
            vec![vec![0.5, 0.5], vec![0.0, 0.0], vec![1.5, -0.5]],
        );
        assert!(m.is_ok());
    }

    #[test]
    fn leverage_rule_rejects_net_zero_row() {
        let err = HoldingMatrix::target_weights(
            vec![d(2), d(3)],
            ab(),
            vec![vec![0.5, 0.5], vec![0.5, -0.5]],
        )
        .unwrap_err();
        assert!(matches!(err, HoldingError::IllegalLeverage { date, .. } if date == d(3)));
    }

    #[test]
    fn leverage_rule_rejects_net_short_row() {
        let err =
            HoldingMatrix::target_weights(vec![d(2)], ab(), vec![vec![-0.6, 0.2]]).unwrap_err();
        assert!(matches!(err, HoldingError::IllegalLeverage { .. }));
    }

    #[test]
    fn shape_is_checked() {
        let err = HoldingMatrix::new(HoldingKind::Volume, vec![d(2)], ab(), vec![vec![1.0]])
            .unwrap_err();
        assert_eq!(
            err,
            HoldingError::RowWidth {
                row: 0,
                width: 1,
                expected: 2
            }
        );

        let err = HoldingMatrix::new(
            HoldingKind::Volume,
            vec![d(3), d(2)],
            ab(),
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        )
        .unwrap_err();
        assert_eq!(err, HoldingError::UnsortedDates(d(2)));
    }

    #[test]
    fn forward_fill_carries_latest_row() {
        let m = HoldingMatrix::target_weights(
            vec![d(3), d(5)],
            ab(),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let daily = m.forward_fill_onto(&[d(2), d(3), d(4), d(5), d(8)]);
        assert_eq!(daily.row(0), &[0.0, 0.0]);
        assert_eq!(daily.row(1), &[1.0, 0.0]);
        assert_eq!(daily.row(2), &[1.0, 0.0]);
        assert_eq!(daily.row(3), &[0.0, 1.0]);
        assert_eq!(daily.row(4), &[0.0, 1.0]);
    }

    #[test]
    fn from_entries_sorts_and_zero_fills() {
        let m = HoldingMatrix::from_entries(
            HoldingKind::Percentage,
            vec![
                (d(5), "B".to_string(), 1.0),
                (d(2), "A".to_string(), 0.6),
                (d(2), "B".to_string(), 0.4),
            ],
        )
        .unwrap();
        assert_eq!(m.dates(), &[d(2), d(5)]);
        assert_eq!(m.universe().ids(), &["A".to_string(), "B".to_string()]);
        assert_eq!(m.row(1), &[0.0, 1.0]);
        assert_eq!(m.get(d(2), "A"), Some(0.6));
    }

    #[test]
    fn to_percentage_normalizes_and_keeps_flat_rows_flat() {
        assert_eq!(to_percentage(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(to_percentage(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(to_percentage(&[]), Vec::<f64>::new());
    }

    #[test]
    fn nonzero_counts_ignore_missing() {
        let m = HoldingMatrix::new(
            HoldingKind::Volume,
            vec![d(2)],
            ab(),
            vec![vec![3.0, f64::NAN]],
        )
        .unwrap();
        assert_eq!(m.nonzero_counts(), vec![1]);
    }
}
