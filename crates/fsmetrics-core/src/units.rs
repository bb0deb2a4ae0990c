//! Latency unit handling.
//!
//! Every bucket boundary and every recorded value in this crate is a
//! millisecond count held in an `f64`. Durations are converted here and
//! nowhere else.

use std::time::{Duration, Instant};

/// Unit used for all latency values, as it appears in help text.
pub const LATENCY_UNIT: &str = "milliseconds";

/// Convert a duration to fractional milliseconds.
///
/// Sub-millisecond precision is kept: 12.5ms becomes `12.5`, not `12`.
pub fn duration_to_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

/// Milliseconds elapsed since `start`.
pub fn millis_since(start: Instant) -> f64 {
    duration_to_millis(start.elapsed())
}
