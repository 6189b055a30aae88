//! Domain types: instruments, universes, holding matrices.

pub mod holding;
pub mod universe;

pub use holding::{
    is_legal_weight_row, to_percentage, HoldingError, HoldingKind, HoldingMatrix,
    LEVERAGE_TOLERANCE,
};
pub use universe::{Universe, UniverseError};

/// Instrument identifier (ticker / exchange code).
pub type InstrumentId = String;
