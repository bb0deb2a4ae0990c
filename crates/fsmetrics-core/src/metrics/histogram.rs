//! Fixed-bucket histogram for latency tracking.
//!
//! Bucket boundaries are shared by every series of a family and never change
//! after construction. Each histogram keeps its counts behind a single short
//! lock so a snapshot of one series is always internally consistent.

use std::sync::Arc;

use parking_lot::Mutex;

use super::snapshot::{BucketSnapshot, HistogramSnapshot, QuantileSnapshot};

/// Quantiles estimated for every snapshot: median, P90 and P99.
pub const QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

#[derive(Debug)]
struct HistogramState {
    /// Non-cumulative counts; the extra trailing slot is the +Inf bucket.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
    max: f64,
}

/// Fixed-bucket histogram for latency measurements in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds in milliseconds, strictly increasing.
    buckets: Arc<[f64]>,
    state: Mutex<HistogramState>,
}

impl Histogram {
    /// Create a histogram over pre-validated boundaries.
    pub fn new(buckets: Arc<[f64]>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self {
            buckets,
            state: Mutex::new(HistogramState {
                counts,
                sum: 0.0,
                count: 0,
                max: 0.0,
            }),
        }
    }

    /// Index of the first bucket whose boundary is >= `value`.
    ///
    /// Returns `buckets.len()` (the +Inf slot) when the value exceeds every
    /// boundary.
    fn bucket_index(&self, value: f64) -> usize {
        self.buckets.partition_point(|&boundary| boundary < value)
    }

    /// Record a value in milliseconds.
    ///
    /// Negative and NaN values are ignored.
    pub fn observe(&self, value_ms: f64) {
        if !(value_ms >= 0.0) {
            return;
        }
        let idx = self.bucket_index(value_ms);
        let mut state = self.state.lock();
        state.counts[idx] += 1;
        state.count += 1;
        state.sum += value_ms;
        if value_ms > state.max {
            state.max = value_ms;
        }
    }

    /// Bucket boundaries in milliseconds.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Get the total count of observations.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Get the sum of all observed values.
    pub fn sum(&self) -> f64 {
        self.state.lock().sum
    }

    /// Get the maximum observed value.
    pub fn max(&self) -> f64 {
        self.state.lock().max
    }

    /// Get approximate percentile (e.g., 0.50 for P50, 0.99 for P99).
    ///
    /// Returns the upper boundary of the bucket containing the target rank,
    /// or `f64::INFINITY` when that rank falls past the last boundary.
    pub fn percentile(&self, p: f64) -> f64 {
        let state = self.state.lock();
        self.percentile_of(&state, p)
    }

    fn percentile_of(&self, state: &HistogramState, p: f64) -> f64 {
        if state.count == 0 {
            return 0.0;
        }

        let target = ((state.count as f64 * p).ceil() as u64).max(1);
        let mut cumulative = 0u64;

        for (i, count) in state.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return self.buckets.get(i).copied().unwrap_or(f64::INFINITY);
            }
        }
        f64::INFINITY
    }

    /// Capture count, sum, max, quantiles and cumulative bucket counts in one step.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let (counts, sum, count, max, quantiles) = {
            let state = self.state.lock();
            let quantiles = QUANTILES
                .iter()
                .map(|&q| QuantileSnapshot {
                    quantile: q,
                    value: self.percentile_of(&state, q),
                })
                .collect::<Vec<_>>();
            (state.counts.clone(), state.sum, state.count, state.max, quantiles)
        };

        let mut cumulative = 0u64;
        let buckets = self
            .buckets
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(counts)
            .map(|(upper_bound, n)| {
                cumulative += n;
                BucketSnapshot {
                    upper_bound,
                    cumulative_count: cumulative,
                }
            })
            .collect();

        HistogramSnapshot {
            count,
            sum,
            max,
            quantiles,
            buckets,
        }
    }
}
