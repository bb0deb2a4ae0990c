//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fsmetrics_core::config::{DEFAULT_NAMESPACE, DEFAULT_SUBSYSTEM};
use fsmetrics_core::MetricsConfig;

use crate::error::{CliError, Result};

/// Default number of workload threads.
pub const DEFAULT_WORKERS: usize = 4;

/// Default operations per workload thread.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Exposition output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Prometheus text format.
    Text,
    /// JSON snapshot.
    Json,
}

/// fsmetrics workload driver
#[derive(Parser, Debug)]
#[command(name = "fsmetrics")]
#[command(version, about = "Record a synthetic snapshotter workload and print its metrics", long_about = None)]
pub struct Args {
    /// Load the registry configuration from a JSON file (overrides schema flags).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Metric namespace.
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Metric subsystem.
    #[arg(long, default_value = DEFAULT_SUBSYSTEM)]
    pub subsystem: String,

    /// Bucket boundaries in milliseconds, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub buckets: Vec<f64>,

    /// Attach the resolved hostname as a `host` label.
    #[arg(long)]
    pub host_label: bool,

    /// Constant label as name=value (repeatable).
    #[arg(long = "const-label")]
    pub const_labels: Vec<String>,

    /// Skip the measurement count and sum counters.
    #[arg(long)]
    pub no_totals: bool,

    /// Workload threads.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Operations per thread.
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Output format.
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

impl Args {
    /// Convert command-line arguments to a registry configuration.
    pub fn into_config(self) -> Result<MetricsConfig> {
        if let Some(path) = &self.config {
            return Ok(MetricsConfig::from_file(path)?);
        }

        let mut config = MetricsConfig::new()
            .with_namespace(self.namespace)
            .with_subsystem(self.subsystem);
        if !self.buckets.is_empty() {
            config = config.with_buckets(self.buckets);
        }
        if self.host_label {
            config = config.with_host_label();
        }
        if self.no_totals {
            config = config.without_totals();
        }
        for pair in &self.const_labels {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| CliError::Args(format!("const label '{pair}' is not name=value")))?;
            config = config.with_const_label(name, value);
        }
        Ok(config)
    }
}
