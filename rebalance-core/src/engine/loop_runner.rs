//! Session-by-session simulation loop.
//!
//! Each session goes through up to four phases:
//! 1. Carry-forward: yesterday's committed ledger becomes today's draft
//! 2. Delisting: held names delisted today are closed at yesterday's close
//! 3. Trading (rebalance sessions only): advisories, projection, sell-then-buy
//! 4. Commit: the draft replaces the ledger and today's rows are recorded
//!
//! Sessions are strictly sequential; within a session only the draft is
//! touched, so no partially processed day is ever visible.

use tracing::{debug, info};

use crate::domain::{HoldingKind, HoldingMatrix};

use super::advisory::{check_stranded_holdings, check_untradable_target, Advisory};
use super::delisting::{resolve_delistings, Liquidation};
use super::derive;
use super::executor::execute;
use super::info::InfoRecord;
use super::planner::project_volumes;
use super::result::{BacktestOutcome, DelistingEvent};
use super::setup::Backtest;
use super::state::{DayKind, DayView, SimulationContext};

/// Everything one session produced, committed together.
#[derive(Debug, Clone)]
pub struct Session {
    pub ctx: SimulationContext,
    pub info: InfoRecord,
    pub advisories: Vec<Advisory>,
    pub liquidations: Vec<Liquidation>,
}

impl Backtest {
    /// Run the simulation over the resolved window.
    pub fn run(&self) -> BacktestOutcome {
        let window = self.window().to_vec();
        let width = self.schedule.universe().len();
        let lot_size = self.config.lot_size;

        let mut ledger = SimulationContext::seed(width, self.config.seed_cash());
        let mut realized = Vec::with_capacity(window.len());
        let mut target_volume = Vec::with_capacity(window.len());
        let mut cash = Vec::with_capacity(window.len());
        let mut info_rows = Vec::with_capacity(window.len());
        let mut advisories = Vec::new();
        let mut delistings = Vec::new();

        for (day, is_rebalance) in self.is_rebalance.iter().enumerate() {
            let kind = DayKind::classify(day, *is_rebalance);
            let session = self.advance(&ledger, kind);

            let date = window[day];
            delistings.extend(session.liquidations.iter().map(|liq| {
                DelistingEvent::new(
                    date,
                    self.schedule.universe().ids()[liq.instrument].clone(),
                    liq,
                )
            }));
            advisories.extend(session.advisories);
            info_rows.push(session.info);
            realized.push(session.ctx.realized.clone());
            target_volume.push(session.ctx.target_volume.clone());
            cash.push(session.ctx.cash);
            ledger = session.ctx;
        }

        // ─── Derivation ───
        let marks = derive::mark_prices(&self.panel, self.start_idx, self.end_idx);
        let account_value = derive::account_value(
            &window,
            &realized,
            &cash,
            &marks,
            lot_size,
            self.config.seed_cash(),
        );
        let benchmark_value = self
            .panel
            .benchmark()
            .map(|b| derive::benchmark_value(&window, &b[self.start_idx..=self.end_idx]));
        let weights = derive::realized_weights(&realized, &marks);

        let universe = self.schedule.universe().clone();
        let matrix = |kind: HoldingKind, rows: &[Vec<f64>]| {
            let mut m = HoldingMatrix::zeros(kind, window.clone(), universe.clone());
            for (t, row) in rows.iter().enumerate() {
                m.set_row(t, row);
            }
            m
        };
        let realized_volume = matrix(HoldingKind::Volume, &realized);
        let target_volume = matrix(HoldingKind::Volume, &target_volume);
        let realized_weights = matrix(HoldingKind::Percentage, &weights);

        let final_value = account_value.last().map_or(0.0, |p| p.value);
        info!(
            sessions = window.len(),
            final_value,
            advisories = advisories.len(),
            delistings = delistings.len(),
            "backtest finished"
        );

        BacktestOutcome {
            config: self.config.clone(),
            rebalance_dates: self.rebalance_dates(),
            dates: window,
            target_weights: self.daily_target.clone(),
            target_volume,
            realized_volume,
            realized_weights,
            cash,
            account_value,
            benchmark_value,
            info: info_rows,
            advisories,
            delistings,
        }
    }

    /// One session transition from the previous committed ledger.
    pub fn advance(&self, prev: &SimulationContext, kind: DayKind) -> Session {
        // ─── Phase 1: Carry-forward ───
        let mut ctx = match kind {
            DayKind::Day0 { .. } => prev.clone(),
            _ => prev.carry_forward(),
        };
        let t = self.start_idx + ctx.day;
        let view = DayView::new(&self.panel, t);
        let cost = self.config.cost_model();
        let lot_size = self.config.lot_size;

        // ─── Phase 2: Delisting ───
        let liquidations = resolve_delistings(&mut ctx, &view, &cost, lot_size);
        let delisted_value: f64 = liquidations.iter().map(|l| l.cash).sum();
        let holding_value = view.value_at_open(&ctx.realized, lot_size);

        if !kind.trades() {
            let info = InfoRecord::idle(view.date, holding_value, ctx.holding_count(), delisted_value);
            return Session {
                ctx,
                info,
                advisories: Vec::new(),
                liquidations,
            };
        }

        // ─── Phase 3: Trading ───
        let target = self.daily_target.row(ctx.day);
        let mut advisories = Vec::new();
        if self.config.warnings {
            let universe = self.schedule.universe();
            let threshold = self.config.warning_threshold;
            advisories.extend(check_stranded_holdings(&ctx.realized, &view, universe, threshold));
            advisories.extend(check_untradable_target(target, &view, universe, threshold));
        }

        let projected = project_volumes(target, &ctx.realized, ctx.cash, &view, lot_size);
        let cash_before = ctx.cash;
        let exec = execute(
            &mut ctx,
            &projected,
            &view,
            &cost,
            lot_size,
            self.config.buy_allocation,
        );
        ctx.target_volume = projected;
        let holding_after = view.value_at_open(&ctx.realized, lot_size);

        debug!(
            date = %view.date,
            cash = ctx.cash,
            sells = exec.sells,
            buys = exec.buys,
            trading_value = exec.sell_value + exec.buy_value,
            "rebalanced"
        );

        // ─── Phase 4: Commit ───
        let info = InfoRecord::traded(
            view.date,
            holding_value,
            holding_after,
            &exec,
            ctx.cash - cash_before,
            ctx.holding_count(),
            delisted_value,
        );
        Session {
            ctx,
            info,
            advisories,
            liquidations,
        }
    }
}
