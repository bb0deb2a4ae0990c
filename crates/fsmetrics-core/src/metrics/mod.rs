//! Metrics collection infrastructure.
//!
//! This module provides the operation latency registry: fixed-bucket
//! histograms and totals counters keyed by label tuple, initialized once
//! per process and read through snapshots.
//!
//! # Usage
//!
//! ```ignore
//! use fsmetrics_core::metrics::new_shared_registry;
//! use fsmetrics_core::{MetricsConfig, FsOperation};
//!
//! // Create a shared registry and initialize it at startup
//! let registry = new_shared_registry();
//! registry.initialize(MetricsConfig::default())?;
//!
//! // Time an operation
//! let timer = registry.start_timer(FsOperation::Mount.as_str());
//! // ... mount ...
//! timer.stop();
//!
//! // Export to Prometheus format
//! let prometheus_text = registry.to_prometheus()?;
//! ```

mod counter;
mod histogram;
mod registry;
mod snapshot;
mod timer;

pub use counter::{Counter, SumCounter};
pub use histogram::{Histogram, QUANTILES};
pub use registry::{
    metric_name, new_shared_registry, MetricRegistry, RegistryState, SharedMetricRegistry,
    MEASUREMENT_COUNT_KEY, MEASUREMENT_SUM_KEY, OPERATION_LATENCY_KEY,
};
pub use snapshot::{
    format_bound, BucketSnapshot, FamilySnapshot, HistogramSnapshot, MetricKind,
    QuantileSnapshot, RegistrySnapshot, SeriesSnapshot, SeriesValue,
};
pub use timer::LatencyTimer;
