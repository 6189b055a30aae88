//! Property tests for simulator invariants.
//!
//! Uses proptest to verify:
//! 1. Cash conservation: account value is cash plus the book marked at close
//! 2. Costs never overdraw cash and turnover is never negative
//! 3. Hold days leave the ledger untouched
//! 4. Ideal-world returns compound the weighted returns and round-trip through logs
//! 5. The leverage rule accepts exactly the flat or net-positive rows

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::sync::Arc;

use rebalance_core::domain::{is_legal_weight_row, LEVERAGE_TOLERANCE};
use rebalance_core::engine::{Backtest, SimulationConfig};
use rebalance_core::{
    ideal_world_backtest, HoldingMatrix, MarketData, MarketDataBuilder, Observation,
};

const IDS: [&str; 3] = ["A", "B", "C"];

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + Duration::days(i as i64)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..200.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// `sessions` rows of (open, close) per instrument.
fn arb_tape(sessions: usize) -> impl Strategy<Value = Vec<Vec<(f64, f64)>>> {
    prop::collection::vec(
        prop::collection::vec((arb_price(), arb_price()), IDS.len()),
        sessions,
    )
}

fn arb_weight_row() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..1.0_f64, IDS.len()).prop_filter("not flat", |r| {
        r.iter().sum::<f64>() > 0.01
    })
}

fn arb_cost() -> impl Strategy<Value = f64> {
    0.0..0.01_f64
}

fn build_market(tape: &[Vec<(f64, f64)>], halted: Option<(usize, usize)>) -> Arc<MarketData> {
    let mut b = MarketDataBuilder::new();
    for (t, row) in tape.iter().enumerate() {
        for (c, (open, close)) in row.iter().enumerate() {
            b.observe(
                day(t),
                IDS[c],
                Observation {
                    open: *open,
                    close: *close,
                    tradable: halted != Some((t, c)),
                    delisted: false,
                },
            );
        }
    }
    Arc::new(b.build().unwrap())
}

fn build_schedule(rows: &[(usize, Vec<f64>)]) -> HoldingMatrix {
    let dates = rows.iter().map(|(t, _)| day(*t)).collect();
    let universe = rebalance_core::Universe::from_ids(IDS).unwrap();
    HoldingMatrix::target_weights(dates, universe, rows.iter().map(|(_, r)| r.clone()).collect())
        .unwrap()
}

fn config(buy: f64, sell: f64, end: usize) -> SimulationConfig {
    SimulationConfig {
        buy_cost: buy,
        sell_cost: sell,
        trade_ratio: 1.0,
        initial_money: 1_000_000.0,
        lot_size: 100.0,
        end: Some(day(end)),
        ..SimulationConfig::default()
    }
}

// ── 1 & 2. Conservation, cash floor, turnover ────────────────────────

proptest! {
    #[test]
    fn account_value_is_cash_plus_book(
        tape in arb_tape(12),
        w0 in arb_weight_row(),
        w1 in arb_weight_row(),
        w2 in arb_weight_row(),
        buy in arb_cost(),
        sell in arb_cost(),
        halted in (1usize..12, 0usize..3),
    ) {
        let market = build_market(&tape, Some(halted));
        let schedule = build_schedule(&[(0, w0), (4, w1), (8, w2)]);
        let out = Backtest::new(schedule, Arc::clone(&market), config(buy, sell, 11))
            .unwrap()
            .run();

        for t in 0..out.dates.len() {
            let book: f64 = out
                .realized_volume
                .row(t)
                .iter()
                .zip(market.close(t))
                .map(|(v, p)| v * p * 100.0)
                .sum();
            let value = out.account_value[t + 1].value;
            prop_assert!((value - (book + out.cash[t])).abs() <= 1e-6 * value.abs().max(1.0));
            prop_assert!(out.cash[t] >= -1e-6);
            prop_assert!(out.info[t].turnover_ratio >= 0.0);
            prop_assert!(out.info[t].friction_value >= -1e-6);
        }
        prop_assert_eq!(out.account_value[0].value, 1_000_000.0);
    }
}

// ── 3. Hold days ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn hold_days_are_idempotent(
        tape in arb_tape(10),
        w0 in arb_weight_row(),
        w1 in arb_weight_row(),
    ) {
        let market = build_market(&tape, None);
        let schedule = build_schedule(&[(0, w0), (6, w1)]);
        let out = Backtest::new(schedule, market, config(0.0015, 0.0015, 9))
            .unwrap()
            .run();

        for t in (1..6).chain(7..10) {
            prop_assert_eq!(out.realized_volume.row(t), out.realized_volume.row(t - 1));
            prop_assert_eq!(out.cash[t], out.cash[t - 1]);
            prop_assert_eq!(out.info[t].trading_value, 0.0);
            prop_assert_eq!(out.info[t].turnover_ratio, 0.0);
        }
    }
}

// ── 4. Ideal world ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn ideal_world_compounds_constant_weights(
        tape in arb_tape(8),
        w in arb_weight_row(),
    ) {
        // Fully invested, unlevered: the compounded value stays positive.
        let total: f64 = w.iter().sum();
        let w: Vec<f64> = w.iter().map(|x| x / total).collect();
        let market = build_market(&tape, None);
        let rows: Vec<(usize, Vec<f64>)> = (0..8).map(|t| (t, w.clone())).collect();
        let schedule = build_schedule(&rows);
        let series = ideal_world_backtest(&schedule, &market, 0.0);

        let mut expected = 1.0;
        for t in 1..8 {
            let r: f64 = (0..IDS.len())
                .map(|c| w[c] * (tape[t][c].1 / tape[t - 1][c].1 - 1.0))
                .sum();
            expected *= 1.0 + r;
        }
        let last = series.final_value();
        prop_assert!((last - expected).abs() <= 1e-9 * expected.abs().max(1.0));

        let mut rebuilt = series.cumulative_value[0];
        for (t, lr) in series.log_return.iter().enumerate().skip(1) {
            rebuilt *= lr.exp();
            let v = series.cumulative_value[t];
            prop_assert!((rebuilt - v).abs() <= 1e-9 * v.abs().max(1.0));
        }
    }
}

// ── 5. Leverage rule ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn leverage_rule_matches_row_check(
        row in prop::collection::vec(prop_oneof![Just(0.0), -1.0..1.0_f64], 3),
    ) {
        let universe = rebalance_core::Universe::from_ids(IDS).unwrap();
        let built = HoldingMatrix::target_weights(vec![day(0)], universe, vec![row.clone()]);
        prop_assert_eq!(built.is_ok(), is_legal_weight_row(&row));

        let flat = row.iter().all(|w| *w == 0.0);
        let net: f64 = row.iter().sum();
        prop_assert_eq!(built.is_ok(), flat || net > LEVERAGE_TOLERANCE);
    }
}
