//! Sort-key arithmetic for fractional ordering.
//!
//! A moved item receives one new key placed between its new neighbours;
//! no other key is rewritten. Bisection halves the available gap on every
//! insertion into the same slot, so callers check [`fits_between`] and fall
//! back to [`renumbered_keys`] once `f64` resolution runs out.

/// Key given to new items and to a move into an otherwise empty list.
pub const DEFAULT_KEY: f64 = 100_000.0;

/// Buffer added past the last key when an item is moved to the end.
pub const APPEND_GAP: f64 = 100.0;

/// Spacing used when a whole collection is renumbered.
pub const RENUMBER_STEP: f64 = 1_000.0;

/// Compute the sort key for an item placed after `prev` and before `next`.
///
/// | prev | next | result |
/// |------|------|--------|
/// | some | some | midpoint |
/// | none | some | `next / 2` |
/// | some | none | `prev + APPEND_GAP` |
/// | none | none | `DEFAULT_KEY` |
pub fn insertion_key(prev: Option<f64>, next: Option<f64>) -> f64 {
    insertion_key_with(prev, next, APPEND_GAP, DEFAULT_KEY)
}

/// Same as [`insertion_key`] with caller-supplied constants.
pub fn insertion_key_with(
    prev: Option<f64>,
    next: Option<f64>,
    append_gap: f64,
    default_key: f64,
) -> f64 {
    match (prev, next) {
        (Some(p), Some(n)) => (p + n) / 2.0,
        (None, Some(n)) => n / 2.0,
        (Some(p), None) => p + append_gap,
        (None, None) => default_key,
    }
}

/// Legacy rows may have no key, or a value that does not parse as a number.
pub fn key_or_default(raw: Option<f64>) -> f64 {
    match raw {
        Some(k) if k.is_finite() => k,
        _ => DEFAULT_KEY,
    }
}

/// True when `key` is strictly greater than `prev` and strictly less than
/// `next`. A missing neighbour imposes no bound.
pub fn fits_between(key: f64, prev: Option<f64>, next: Option<f64>) -> bool {
    if !key.is_finite() {
        return false;
    }
    prev.is_none_or(|p| key > p) && next.is_none_or(|n| key < n)
}

/// True when both neighbours exist and are closer than `epsilon`.
pub fn gap_exhausted(prev: Option<f64>, next: Option<f64>, epsilon: f64) -> bool {
    match (prev, next) {
        (Some(p), Some(n)) => (n - p) < epsilon,
        _ => false,
    }
}

/// Evenly spaced keys `step, 2*step, ..., len*step`.
pub fn renumbered_keys(len: usize, step: f64) -> Vec<f64> {
    (1..=len).map(|i| i as f64 * step).collect()
}
