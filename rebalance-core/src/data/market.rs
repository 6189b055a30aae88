//! Market panel: aligned open/close prices and tradability flags.
//!
//! The panel is read-only input to the simulator. Runs share it through
//! `Arc<MarketData>`; nothing in the engine mutates it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::domain::{InstrumentId, Universe, UniverseError};

#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("market panel has no dates")]
    Empty,

    #[error("dates must be strictly ascending (violated at {0})")]
    UnsortedDates(NaiveDate),

    #[error("{panel} panel has {rows} rows but {dates} dates")]
    RowCount {
        panel: &'static str,
        rows: usize,
        dates: usize,
    },

    #[error("{panel} panel row {row} has {width} columns, universe has {expected}")]
    RowWidth {
        panel: &'static str,
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("benchmark has {len} values but the panel has {dates} dates")]
    BenchmarkLength { len: usize, dates: usize },

    #[error("instrument '{instrument}' is delisted before {date} but listed again on it")]
    DelistingReversed {
        instrument: InstrumentId,
        date: NaiveDate,
    },

    #[error("instrument '{instrument}' is marked both delisted and tradable on {date}")]
    DelistedButTradable {
        instrument: InstrumentId,
        date: NaiveDate,
    },

    #[error(transparent)]
    Universe(#[from] UniverseError),
}

/// One instrument's market state on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub open: f64,
    pub close: f64,
    /// Listed, not delisted, not halted.
    pub tradable: bool,
    pub delisted: bool,
}

impl Observation {
    /// No data at all: missing prices, not tradable.
    pub fn missing() -> Self {
        Self {
            open: f64::NAN,
            close: f64::NAN,
            tradable: false,
            delisted: false,
        }
    }
}

/// Date × instrument market panel plus an optional benchmark close series.
#[derive(Debug, Clone)]
pub struct MarketData {
    dates: Vec<NaiveDate>,
    universe: Universe,
    open: Vec<Vec<f64>>,
    close: Vec<Vec<f64>>,
    tradable: Vec<Vec<bool>>,
    delisted: Vec<Vec<bool>>,
    benchmark: Option<Vec<f64>>,
}

impl MarketData {
    pub fn new(
        dates: Vec<NaiveDate>,
        universe: Universe,
        open: Vec<Vec<f64>>,
        close: Vec<Vec<f64>>,
        tradable: Vec<Vec<bool>>,
        delisted: Vec<Vec<bool>>,
        benchmark: Option<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if dates.is_empty() {
            return Err(DataError::Empty);
        }
        for w in dates.windows(2) {
            if w[1] <= w[0] {
                return Err(DataError::UnsortedDates(w[1]));
            }
        }
        check_shape("open", &open, dates.len(), universe.len())?;
        check_shape("close", &close, dates.len(), universe.len())?;
        check_shape("tradable", &tradable, dates.len(), universe.len())?;
        check_shape("delisted", &delisted, dates.len(), universe.len())?;
        if let Some(b) = &benchmark {
            if b.len() != dates.len() {
                return Err(DataError::BenchmarkLength {
                    len: b.len(),
                    dates: dates.len(),
                });
            }
        }

        for t in 0..dates.len() {
            for (c, id) in universe.ids().iter().enumerate() {
                if delisted[t][c] && tradable[t][c] {
                    return Err(DataError::DelistedButTradable {
                        instrument: id.clone(),
                        date: dates[t],
                    });
                }
                if t > 0 && delisted[t - 1][c] && !delisted[t][c] {
                    return Err(DataError::DelistingReversed {
                        instrument: id.clone(),
                        date: dates[t],
                    });
                }
            }
        }

        Ok(Self {
            dates,
            universe,
            open,
            close,
            tradable,
            delisted,
            benchmark,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
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

    /// Index of the first session on or after `date`.
    pub fn first_session_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let i = self.dates.partition_point(|d| *d < date);
        (i < self.dates.len()).then_some(i)
    }

    /// Index of the last session on or before `date`.
    pub fn last_session_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        self.dates.partition_point(|d| *d <= date).checked_sub(1)
    }

    pub fn open(&self, t: usize) -> &[f64] {
        &self.open[t]
    }

    pub fn close(&self, t: usize) -> &[f64] {
        &self.close[t]
    }

    pub fn tradable(&self, t: usize) -> &[bool] {
        &self.tradable[t]
    }

    pub fn delisted(&self, t: usize) -> &[bool] {
        &self.delisted[t]
    }

    pub fn benchmark(&self) -> Option<&[f64]> {
        self.benchmark.as_deref()
    }

    /// Whether instrument `c` has at least one open and one close observation.
    pub fn has_price_history(&self, c: usize) -> bool {
        let any_open = self.open.iter().any(|r| !r[c].is_nan());
        let any_close = self.close.iter().any(|r| !r[c].is_nan());
        any_open && any_close
    }

    /// Same panel with a different benchmark series.
    pub fn with_benchmark(&self, benchmark: Option<Vec<f64>>) -> Result<Self, DataError> {
        Self::new(
            self.dates.clone(),
            self.universe.clone(),
            self.open.clone(),
            self.close.clone(),
            self.tradable.clone(),
            self.delisted.clone(),
            benchmark,
        )
    }

    /// Re-key the panel onto another universe. Instruments the panel does not
    /// know get missing prices and are never tradable.
    pub fn project_onto(&self, target: &Universe) -> Self {
        let source: Vec<Option<usize>> =
            target.ids().iter().map(|id| self.universe.get(id)).collect();

        fn pick<T: Copy>(panel: &[Vec<T>], source: &[Option<usize>], fill: T) -> Vec<Vec<T>> {
            panel
                .iter()
                .map(|row| source.iter().map(|s| s.map_or(fill, |c| row[c])).collect())
                .collect()
        }

        Self {
            dates: self.dates.clone(),
            universe: target.clone(),
            open: pick(&self.open, &source, f64::NAN),
            close: pick(&self.close, &source, f64::NAN),
            tradable: pick(&self.tradable, &source, false),
            delisted: pick(&self.delisted, &source, false),
            benchmark: self.benchmark.clone(),
        }
    }

    /// Observation for one cell, by position.
    pub fn observation(&self, t: usize, c: usize) -> Observation {
        Observation {
            open: self.open[t][c],
            close: self.close[t][c],
            tradable: self.tradable[t][c],
            delisted: self.delisted[t][c],
        }
    }
}

fn check_shape<T>(
    panel: &'static str,
    rows: &[Vec<T>],
    dates: usize,
    width: usize,
) -> Result<(), DataError> {
    if rows.len() != dates {
        return Err(DataError::RowCount {
            panel,
            rows: rows.len(),
            dates,
        });
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(DataError::RowWidth {
                panel,
                row: i,
                width: row.len(),
                expected: width,
            });
        }
    }
    Ok(())
}

/// Assembles a [`MarketData`] panel from long-format observations.
///
/// Dates and instruments are taken from the observations (sorted). Missing
/// cells become [`Observation::missing`]. Once an instrument is seen
/// delisted it stays delisted on every later date.
#[derive(Debug, Default)]
pub struct MarketDataBuilder {
    cells: BTreeMap<(NaiveDate, InstrumentId), Observation>,
    benchmark: BTreeMap<NaiveDate, f64>,
}

impl MarketDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, date: NaiveDate, id: impl Into<InstrumentId>, obs: Observation) {
        self.cells.insert((date, id.into()), obs);
    }

    pub fn benchmark_close(&mut self, date: NaiveDate, close: f64) {
        self.benchmark.insert(date, close);
    }

    pub fn build(self) -> Result<MarketData, DataError> {
        let dates: Vec<NaiveDate> = self
            .cells
            .keys()
            .map(|(d, _)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let ids: BTreeSet<InstrumentId> = self.cells.keys().map(|(_, id)| id.clone()).collect();
        let universe = Universe::new(ids.into_iter().collect())?;

        let (n, w) = (dates.len(), universe.len());
        let mut open = vec![vec![f64::NAN; w]; n];
        let mut close = vec![vec![f64::NAN; w]; n];
        let mut tradable = vec![vec![false; w]; n];
        let mut delisted = vec![vec![false; w]; n];

        for ((date, id), obs) in &self.cells {
            let (Ok(t), Ok(c)) = (dates.binary_search(date), universe.index_of(id)) else {
                continue;
            };
            open[t][c] = obs.open;
            close[t][c] = obs.close;
            tradable[t][c] = obs.tradable && !obs.delisted;
            delisted[t][c] = obs.delisted;
        }

        for t in 1..n {
            for c in 0..w {
                if delisted[t - 1][c] {
                    delisted[t][c] = true;
                    tradable[t][c] = false;
                }
            }
        }

        let benchmark = if self.benchmark.is_empty() {
            None
        } else {
            Some(
                dates
                    .iter()
                    .map(|d| self.benchmark.get(d).copied().unwrap_or(f64::NAN))
                    .collect(),
            )
        };

        MarketData::new(dates, universe, open, close, tradable, delisted, benchmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn obs(price: f64) -> Observation {
        Observation {
            open: price,
            close: price,
            tradable: true,
            delisted: false,
        }
    }

    #[test]
    fn builder_fills_gaps_as_missing() {
        let mut b = MarketDataBuilder::new();
        b.observe(d(1), "A", obs(10.0));
        b.observe(d(2), "A", obs(11.0));
        b.observe(d(1), "B", obs(20.0));
        let m = b.build().unwrap();

        assert_eq!(m.len(), 2);
        let c = m.universe().index_of("B").unwrap();
        assert!(m.open(1)[c].is_nan());
        assert!(!m.tradable(1)[c]);
        assert!(m.benchmark().is_none());
    }

    #[test]
    fn builder_makes_delisting_sticky() {
        let mut b = MarketDataBuilder::new();
        b.observe(
            d(1),
            "A",
            Observation {
                delisted: true,
                ..obs(5.0)
            },
        );
        b.observe(d(2), "A", obs(5.0));
        let m = b.build().unwrap();
        assert!(m.delisted(1)[0]);
        assert!(!m.tradable(1)[0]);
    }

    #[test]
    fn reversed_delisting_rejected() {
        let u = Universe::from_ids(["A"]).unwrap();
        let err = MarketData::new(
            vec![d(1), d(2)],
            u,
            vec![vec![1.0], vec![1.0]],
            vec![vec![1.0], vec![1.0]],
            vec![vec![false], vec![true]],
            vec![vec![true], vec![false]],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::DelistingReversed { .. }));
    }

    #[test]
    fn delisted_cell_cannot_be_tradable() {
        let u = Universe::from_ids(["A", "B"]).unwrap();
        let err = MarketData::new(
            vec![d(1)],
            u,
            vec![vec![1.0, 2.0]],
            vec![vec![1.0, 2.0]],
            vec![vec![true, true]],
            vec![vec![false, true]],
            None,
        )
        .unwrap_err();
        match err {
            DataError::DelistedButTradable { instrument, date } => {
                assert_eq!(instrument.as_str(), "B");
                assert_eq!(date, d(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn benchmark_length_checked() {
        let u = Universe::from_ids(["A"]).unwrap();
        let err = MarketData::new(
            vec![d(1)],
            u,
            vec![vec![1.0]],
            vec![vec![1.0]],
            vec![vec![true]],
            vec![vec![false]],
            Some(vec![1.0, 2.0]),
        )
        .unwrap_err();
        assert_eq!(err, DataError::BenchmarkLength { len: 2, dates: 1 });
    }

    #[test]
    fn projection_marks_unknown_instruments_untradable() {
        let mut b = MarketDataBuilder::new();
        b.observe(d(1), "A", obs(10.0));
        let m = b.build().unwrap();

        let target = Universe::from_ids(["Z", "A"]).unwrap();
        let p = m.project_onto(&target);
        assert!(p.open(0)[0].is_nan());
        assert!(!p.tradable(0)[0]);
        assert_eq!(p.open(0)[1], 10.0);
        assert!(!p.has_price_history(0));
        assert!(p.has_price_history(1));
    }

    #[test]
    fn session_lookups() {
        let mut b = MarketDataBuilder::new();
        b.observe(d(4), "A", obs(1.0));
        b.observe(d(6), "A", obs(1.0));
        let m = b.build().unwrap();
        assert_eq!(m.first_session_on_or_after(d(5)), Some(1));
        assert_eq!(m.first_session_on_or_after(d(7)), None);
        assert_eq!(m.last_session_on_or_before(d(5)), Some(0));
        assert_eq!(m.last_session_on_or_before(d(3)), None);
    }
}
