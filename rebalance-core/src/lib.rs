//! Rebalance Core: holding matrices, market panel, lot-level execution simulator.
//!
//! This crate turns a schedule of target weights into the trades, cash and
//! account value a real account would have produced:
//! - Domain types (universe, holding matrices, leverage rule)
//! - Read-only market panel with tradability and delisting flags
//! - Session-by-session simulation loop with sell-then-buy execution
//! - Ideal-world reference returns for comparison

pub mod data;
pub mod domain;
pub mod engine;
pub mod ideal;
pub mod numeric;

pub use data::{DataError, MarketData, MarketDataBuilder, Observation};
pub use domain::{HoldingError, HoldingKind, HoldingMatrix, InstrumentId, Universe};
pub use engine::{Backtest, BacktestOutcome, SetupError, SimulationConfig};
pub use ideal::{ideal_world_backtest, IdealWorldSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across sweep threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<MarketData>();
        require_sync::<MarketData>();
        require_send::<HoldingMatrix>();
        require_sync::<HoldingMatrix>();
        require_send::<Backtest>();
        require_sync::<Backtest>();
        require_send::<BacktestOutcome>();
        require_sync::<BacktestOutcome>();
        require_send::<SimulationConfig>();
        require_sync::<SimulationConfig>();
        require_send::<IdealWorldSeries>();
        require_sync::<IdealWorldSeries>();
    }
}
