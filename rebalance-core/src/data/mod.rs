//! Market data consumed by the simulator.

pub mod market;

pub use market::{DataError, MarketData, MarketDataBuilder, Observation};
