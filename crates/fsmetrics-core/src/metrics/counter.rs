//! Monotonic counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic integer counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Monotonic floating-point accumulator.
///
/// The value is stored as `f64` bits and updated with compare-and-swap.
#[derive(Debug, Default)]
pub struct SumCounter {
    bits: AtomicU64,
}

impl SumCounter {
    /// Create an accumulator at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-negative amount. Negative or NaN amounts are ignored.
    pub fn add(&self, amount: f64) {
        if !(amount >= 0.0) {
            return;
        }
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + amount).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}
