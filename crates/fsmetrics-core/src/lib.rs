//! fsmetrics Core - Operation latency metrics for the snapshotter filesystem.
//!
//! This crate provides a once-initialized registry that records mount,
//! remote registry fetch and directory read latencies in milliseconds and
//! exposes them to a pull-based exporter.

pub mod config;
pub mod error;
pub mod export;
pub mod hostname;
pub mod metrics;
pub mod operation;
pub mod units;

pub use config::{exponential_buckets, linear_buckets, MetricsConfig};
pub use error::{Error, Result};
pub use export::encode_text;
pub use operation::FsOperation;
pub use units::{duration_to_millis, millis_since};

// Metrics exports
pub use metrics::{
    metric_name, new_shared_registry, HistogramSnapshot, LatencyTimer, MetricRegistry,
    RegistrySnapshot, RegistryState, SharedMetricRegistry,
};
