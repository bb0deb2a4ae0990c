//! Registry configuration.
//!
//! One canonical schema for the whole process: namespace, subsystem, bucket
//! boundaries (milliseconds) and label dimensions are fixed here and
//! validated before anything is registered.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default metric namespace.
pub const DEFAULT_NAMESPACE: &str = "stargz";

/// Default metric subsystem.
pub const DEFAULT_SUBSYSTEM: &str = "fs";

/// Label carrying the operation name. Always the first dimension.
pub const OPERATION_LABEL: &str = "operation_type";

/// Label carrying the resolved hostname when enabled. Always the last dimension.
pub const HOST_LABEL: &str = "host";

/// Default latency buckets in milliseconds: 1, 2, 4, ... 16384.
pub fn default_buckets() -> Vec<f64> {
    exponential_buckets(1.0, 2.0, 15)
}

/// `count` buckets starting at `start`, each `factor` times the previous.
///
/// Returns an empty list for degenerate input; `validate` rejects it.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    if start <= 0.0 || factor <= 1.0 {
        return Vec::new();
    }
    let mut buckets = Vec::with_capacity(count);
    let mut next = start;
    for _ in 0..count {
        buckets.push(next);
        next *= factor;
    }
    buckets
}

/// `count` buckets starting at `start`, `width` apart.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    if width <= 0.0 {
        return Vec::new();
    }
    (0..count).map(|i| start + width * i as f64).collect()
}

/// Metrics registry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix for every metric name.
    pub namespace: String,

    /// Second prefix for every metric name.
    pub subsystem: String,

    /// Latency bucket upper bounds in milliseconds, strictly increasing.
    pub bucket_boundaries: Vec<f64>,

    /// Caller-supplied dimensions following `operation_type`.
    pub extra_labels: Vec<String>,

    /// Append a `host` dimension resolved once at initialization.
    pub host_label: bool,

    /// Labels attached to every series with a fixed value.
    pub const_labels: BTreeMap<String, String>,

    /// Also register the measurement count and sum counter families.
    pub track_totals: bool,
}

impl MetricsConfig {
    /// Create a configuration with the default schema.
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            subsystem: DEFAULT_SUBSYSTEM.to_string(),
            bucket_boundaries: default_buckets(),
            extra_labels: Vec::new(),
            host_label: false,
            const_labels: BTreeMap::new(),
            track_totals: true,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the subsystem.
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Set the bucket boundaries (milliseconds).
    pub fn with_buckets(mut self, boundaries: Vec<f64>) -> Self {
        self.bucket_boundaries = boundaries;
        self
    }

    /// Add a caller-supplied label dimension.
    pub fn with_extra_label(mut self, name: impl Into<String>) -> Self {
        self.extra_labels.push(name.into());
        self
    }

    /// Enable the `host` label.
    pub fn with_host_label(mut self) -> Self {
        self.host_label = true;
        self
    }

    /// Add a constant label.
    pub fn with_const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    /// Disable the count and sum counter families.
    pub fn without_totals(mut self) -> Self {
        self.track_totals = false;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Full ordered label schema for per-series labels.
    pub fn label_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.extra_labels.len() + 2);
        names.push(OPERATION_LABEL.to_string());
        names.extend(self.extra_labels.iter().cloned());
        if self.host_label {
            names.push(HOST_LABEL.to_string());
        }
        names
    }

    /// Check every invariant the registry relies on.
    pub fn validate(&self) -> Result<()> {
        validate_identifier("namespace", &self.namespace)?;
        validate_identifier("subsystem", &self.subsystem)?;
        validate_buckets(&self.bucket_boundaries)?;

        let names = self.label_names();
        let mut seen = std::collections::HashSet::new();
        let const_names = self.const_labels.keys().map(String::as_str);
        for name in names.iter().map(String::as_str).chain(const_names) {
            validate_label_name(name)?;
            if !seen.insert(name) {
                return Err(Error::config(format!("duplicate label name '{name}'")));
            }
        }
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_buckets(boundaries: &[f64]) -> Result<()> {
    if boundaries.is_empty() {
        return Err(Error::config("bucket boundaries must not be empty"));
    }
    for &b in boundaries {
        if !b.is_finite() {
            return Err(Error::config(format!("bucket boundary {b} is not finite")));
        }
        if b < 0.0 {
            return Err(Error::config(format!("bucket boundary {b} is negative")));
        }
    }
    for pair in boundaries.windows(2) {
        if pair[0] >= pair[1] {
            return Err(Error::config(format!(
                "bucket boundaries must be strictly increasing ({} >= {})",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if !is_identifier(value) {
        return Err(Error::config(format!("invalid {what} '{value}'")));
    }
    Ok(())
}

fn validate_label_name(name: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(Error::config(format!("invalid label name '{name}'")));
    }
    // reserved by the exposition format
    if name == "le" || name == "quantile" || name.starts_with("__") {
        return Err(Error::config(format!("label name '{name}' is reserved")));
    }
    Ok(())
}
