//! Per-session bookkeeping row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::numeric::safe_ratio;

use super::executor::Execution;

/// Trading statistics for one session.
///
/// `holding_value` is the book marked at the open after delisting resolution
/// and before any trade. On sessions without trading all flow fields are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub date: NaiveDate,
    pub holding_value: f64,
    pub sell_value: f64,
    pub buy_value: f64,
    pub trading_value: f64,
    /// `trading_value / holding_value`, zero when nothing was held.
    pub turnover_ratio: f64,
    /// Book value at the open before trading minus the book value at the
    /// open after trading. Negative when the session was a net buyer.
    pub cost_value: f64,
    /// Cash plus book lost to trading costs today, marked at the open.
    pub friction_value: f64,
    /// Non-zero realized positions at the end of the session.
    pub holding_count: usize,
    /// Cash credited by delisting close-outs today.
    pub delisted_value: f64,
}

impl InfoRecord {
    /// Record for a session with no trading.
    pub fn idle(date: NaiveDate, holding_value: f64, holding_count: usize, delisted_value: f64) -> Self {
        Self {
            date,
            holding_value,
            sell_value: 0.0,
            buy_value: 0.0,
            trading_value: 0.0,
            turnover_ratio: 0.0,
            cost_value: 0.0,
            friction_value: 0.0,
            holding_count,
            delisted_value,
        }
    }

    /// Record for a trading session.
    ///
    /// `holding_after` is the book marked at the same opens once execution
    /// finished; `cash_change` is the session's net cash movement from trades.
    pub fn traded(
        date: NaiveDate,
        holding_value: f64,
        holding_after: f64,
        exec: &Execution,
        cash_change: f64,
        holding_count: usize,
        delisted_value: f64,
    ) -> Self {
        let trading_value = exec.sell_value + exec.buy_value;
        let cost_value = holding_value - holding_after;
        Self {
            date,
            holding_value,
            sell_value: exec.sell_value,
            buy_value: exec.buy_value,
            trading_value,
            turnover_ratio: safe_ratio(trading_value, holding_value.abs()),
            cost_value,
            friction_value: cost_value - cash_change,
            holding_count,
            delisted_value,
        }
    }
}
