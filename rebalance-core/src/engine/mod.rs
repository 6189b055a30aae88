//! Execution simulator: configuration, per-session transitions, the loop,
//! and end-of-run derivation.

pub mod advisory;
pub mod config;
pub mod cost_model;
pub mod delisting;
pub mod derive;
pub mod executor;
pub mod info;
pub mod loop_runner;
pub mod planner;
pub mod result;
pub mod setup;
pub mod state;

pub use advisory::{Advisory, AdvisoryKind};
pub use config::{SimulationConfig, DEFAULT_SETTLEMENT_SESSIONS, REQUIRED_TAIL_SESSIONS};
pub use cost_model::CostModel;
pub use delisting::Liquidation;
pub use executor::{BuyAllocation, Execution};
pub use info::InfoRecord;
pub use loop_runner::Session;
pub use result::{BacktestOutcome, DelistingEvent, ValuePoint};
pub use setup::{Backtest, SetupError};
pub use state::{DayKind, DayView, SimulationContext};
