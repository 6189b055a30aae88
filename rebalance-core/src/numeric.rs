//! Numeric policies shared by the simulator.
//!
//! Missing market data arrives as NaN. Every place the engine folds a
//! missing value into a sum or a volume goes through one of these helpers,
//! so "missing counts as zero" happens at named boundaries instead of as a
//! side effect of float arithmetic.

/// Map NaN and infinities to zero; finite values pass through unchanged.
#[inline]
pub fn treat_missing_as_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Sum that skips missing values.
pub fn nan_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().map(treat_missing_as_zero).sum()
}

/// Floor the magnitude and restore the sign: `-2.7 -> -2.0`, `2.7 -> 2.0`.
///
/// Lot counts are always truncated toward zero so a projected trade never
/// exceeds what the cash estimate affords. Missing input yields zero.
#[inline]
pub fn floor_toward_zero(x: f64) -> f64 {
    let x = treat_missing_as_zero(x);
    x.abs().floor() * x.signum()
}

/// `num / den`, defined as zero when the denominator is zero or the
/// result is not finite.
#[inline]
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        treat_missing_as_zero(num / den)
    }
}

/// Approximate float equality for tests and invariant checks.
#[inline]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
}
