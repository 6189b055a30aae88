//! Backtest construction: validation and window resolution.
//!
//! Everything that can make a run fail is checked here. Once a [`Backtest`]
//! exists, [`Backtest::run`](super::loop_runner) cannot fail.

use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::data::{DataError, MarketData};
use crate::domain::{HoldingError, HoldingKind, HoldingMatrix, InstrumentId};

use super::config::SimulationConfig;

#[derive(Debug, Error, PartialEq)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("target schedule must hold percentage weights, got lot volumes")]
    NotPercentage,

    #[error("target schedule has no rebalance dates")]
    EmptySchedule,

    #[error(transparent)]
    Leverage(#[from] HoldingError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("no price data for instruments with target weight: {}", .instruments.join(", "))]
    MissingPriceData { instruments: Vec<InstrumentId> },

    #[error("price data starts {tape_start}, after the simulation start {start}")]
    StartNotCovered {
        start: NaiveDate,
        tape_start: NaiveDate,
    },

    #[error("simulation start {start} is after the last price date {tape_end}")]
    StartAfterTape {
        start: NaiveDate,
        tape_end: NaiveDate,
    },

    #[error("price data ends {tape_end}, before the simulation end {end}")]
    EndNotCovered { end: NaiveDate, tape_end: NaiveDate },

    #[error(
        "price data has {available} sessions after the last rebalance {last_rebalance}, \
         {required} are required when no end date is given"
    )]
    InsufficientTail {
        last_rebalance: NaiveDate,
        available: usize,
        required: usize,
    },

    #[error("rebalance date {0} is not a trading session in the price data")]
    RebalanceDateNotOnTape(NaiveDate),

    #[error("simulation window {start}..={end} contains no sessions")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },
}

/// A validated simulation, ready to run any number of times.
///
/// The market panel is shared; each [`run`](Backtest::run) owns its own
/// ledger, so one `Backtest` (or many built on the same `Arc<MarketData>`)
/// can be run from several threads at once.
#[derive(Debug, Clone)]
pub struct Backtest {
    pub(crate) config: SimulationConfig,
    pub(crate) schedule: HoldingMatrix,
    /// Panel as supplied by the caller.
    pub(crate) market: Arc<MarketData>,
    /// Panel keyed on the schedule's universe. Indices below are into it.
    pub(crate) panel: Arc<MarketData>,
    pub(crate) start_idx: usize,
    pub(crate) end_idx: usize,
    /// Schedule forward-filled onto the window.
    pub(crate) daily_target: HoldingMatrix,
    /// Per window session: is it a rebalance date.
    pub(crate) is_rebalance: Vec<bool>,
}

impl Backtest {
    pub fn new(
        schedule: HoldingMatrix,
        market: Arc<MarketData>,
        config: SimulationConfig,
    ) -> Result<Self, SetupError> {
        config.validate().map_err(SetupError::InvalidConfig)?;
        if schedule.kind() != HoldingKind::Percentage {
            return Err(SetupError::NotPercentage);
        }
        if schedule.is_empty() {
            return Err(SetupError::EmptySchedule);
        }
        schedule.check_leverage()?;

        let panel = if market.universe() == schedule.universe() {
            Arc::clone(&market)
        } else {
            Arc::new(market.project_onto(schedule.universe()))
        };

        let missing: Vec<InstrumentId> = schedule
            .ever_held()
            .into_iter()
            .filter(|&c| !panel.has_price_history(c))
            .map(|c| schedule.universe().ids()[c].clone())
            .collect();
        if !missing.is_empty() {
            return Err(SetupError::MissingPriceData {
                instruments: missing,
            });
        }

        let (start_idx, end_idx) = resolve_window(&schedule, &panel, &config)?;

        let window = &panel.dates()[start_idx..=end_idx];
        let daily_target = schedule.forward_fill_onto(window);
        let is_rebalance: Vec<bool> = window
            .iter()
            .map(|d| schedule.position_of(*d).is_some())
            .collect();

        info!(
            start = %window[0],
            end = %window[window.len() - 1],
            sessions = window.len(),
            instruments = schedule.universe().len(),
            rebalances = is_rebalance.iter().filter(|r| **r).count(),
            "backtest ready"
        );

        Ok(Self {
            config,
            schedule,
            market,
            panel,
            start_idx,
            end_idx,
            daily_target,
            is_rebalance,
        })
    }

    /// Same market and configuration, different target schedule.
    pub fn with_weights(&self, schedule: HoldingMatrix) -> Result<Self, SetupError> {
        Self::new(schedule, Arc::clone(&self.market), self.config.clone())
    }

    /// Same schedule and configuration, different benchmark series (one close
    /// per panel date, or `None` to drop it).
    pub fn with_benchmark(&self, benchmark: Option<Vec<f64>>) -> Result<Self, SetupError> {
        let market = Arc::new(self.market.with_benchmark(benchmark)?);
        Self::new(self.schedule.clone(), market, self.config.clone())
    }

    /// Same schedule and market, different configuration.
    pub fn with_config(&self, config: SimulationConfig) -> Result<Self, SetupError> {
        Self::new(self.schedule.clone(), Arc::clone(&self.market), config)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn schedule(&self) -> &HoldingMatrix {
        &self.schedule
    }

    pub fn market(&self) -> &Arc<MarketData> {
        &self.market
    }

    /// Sessions of the simulation window.
    pub fn window(&self) -> &[NaiveDate] {
        &self.panel.dates()[self.start_idx..=self.end_idx]
    }

    pub fn start_date(&self) -> NaiveDate {
        self.panel.dates()[self.start_idx]
    }

    pub fn end_date(&self) -> NaiveDate {
        self.panel.dates()[self.end_idx]
    }

    pub fn daily_target(&self) -> &HoldingMatrix {
        &self.daily_target
    }

    pub fn rebalance_dates(&self) -> Vec<NaiveDate> {
        self.window()
            .iter()
            .zip(&self.is_rebalance)
            .filter(|(_, r)| **r)
            .map(|(d, _)| *d)
            .collect()
    }
}

/// Resolve the `[start, end]` window to panel indices.
fn resolve_window(
    schedule: &HoldingMatrix,
    panel: &MarketData,
    config: &SimulationConfig,
) -> Result<(usize, usize), SetupError> {
    let dates = panel.dates();
    let (tape_start, tape_end) = (dates[0], dates[dates.len() - 1]);
    let first_rebalance = schedule.dates()[0];
    let last_rebalance = schedule.dates()[schedule.len() - 1];

    for d in schedule.dates() {
        if (tape_start..=tape_end).contains(d) && panel.position_of(*d).is_none() {
            return Err(SetupError::RebalanceDateNotOnTape(*d));
        }
    }

    let start = config
        .start
        .map_or(first_rebalance, |s| s.max(first_rebalance));
    if start < tape_start {
        return Err(SetupError::StartNotCovered { start, tape_start });
    }
    let start_idx = panel
        .first_session_on_or_after(start)
        .ok_or(SetupError::StartAfterTape { start, tape_end })?;

    let end_idx = match config.end {
        Some(end) => {
            if end > tape_end {
                return Err(SetupError::EndNotCovered { end, tape_end });
            }
            panel
                .last_session_on_or_before(end)
                .filter(|&e| e >= start_idx)
                .ok_or(SetupError::EmptyWindow { start, end })?
        }
        None => {
            let required = config
                .required_tail_sessions
                .max(config.settlement_sessions);
            let last_idx = panel.position_of(last_rebalance);
            let available = last_idx.map_or(0, |i| dates.len() - 1 - i);
            match last_idx {
                Some(i) if available >= required => i + config.settlement_sessions,
                _ => {
                    return Err(SetupError::InsufficientTail {
                        last_rebalance,
                        available,
                        required,
                    })
                }
            }
        }
    };

    if end_idx < start_idx {
        return Err(SetupError::EmptyWindow {
            start,
            end: dates[end_idx],
        });
    }
    Ok((start_idx, end_idx))
}
