//! Read-only exposition model.
//!
//! These types are what an exporter sees: one entry per metric family, one
//! series per label tuple.

use serde::{Serialize, Serializer};

/// Point-in-time view of every family in a registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    /// Metric families in registration order.
    pub families: Vec<FamilySnapshot>,
}

impl RegistrySnapshot {
    /// Find a family by its fully qualified name.
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.name == name)
    }
}

/// Metric family type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Bucketed latency distribution.
    Histogram,
    /// Monotonic counter.
    Counter,
}

impl MetricKind {
    /// Type name used in `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Histogram => "histogram",
            MetricKind::Counter => "counter",
        }
    }
}

/// All series of one metric family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilySnapshot {
    /// Fully qualified name (`{namespace}_{subsystem}_{name}`).
    pub name: String,
    /// Help text.
    pub help: String,
    /// Family type.
    pub kind: MetricKind,
    /// Series sorted by label values.
    pub series: Vec<SeriesSnapshot>,
}

impl FamilySnapshot {
    /// Find the series whose labels contain every given pair.
    pub fn series_with(&self, labels: &[(&str, &str)]) -> Option<&SeriesSnapshot> {
        self.series.iter().find(|s| {
            labels
                .iter()
                .all(|(name, value)| s.label(name) == Some(*value))
        })
    }
}

/// One labeled series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    /// Label pairs, schema labels first then constant labels.
    pub labels: Vec<(String, String)>,
    /// Captured value.
    pub value: SeriesValue,
}

impl SeriesSnapshot {
    /// Value of a label, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Histogram data, if this is a histogram series.
    pub fn histogram(&self) -> Option<&HistogramSnapshot> {
        match &self.value {
            SeriesValue::Histogram(h) => Some(h),
            SeriesValue::Counter(_) => None,
        }
    }

    /// Counter value, if this is a counter series.
    pub fn counter(&self) -> Option<f64> {
        match self.value {
            SeriesValue::Counter(v) => Some(v),
            SeriesValue::Histogram(_) => None,
        }
    }
}

/// Captured series value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesValue {
    /// Histogram counts.
    Histogram(HistogramSnapshot),
    /// Counter value.
    Counter(f64),
}

/// Consistent capture of one histogram series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// Number of observations.
    pub count: u64,
    /// Sum of observations in milliseconds.
    pub sum: f64,
    /// Largest observation in milliseconds.
    pub max: f64,
    /// Bucket-estimated quantiles, captured with the counts.
    pub quantiles: Vec<QuantileSnapshot>,
    /// Cumulative buckets; the last one is +Inf and equals `count`.
    pub buckets: Vec<BucketSnapshot>,
}

impl HistogramSnapshot {
    /// Cumulative count for the bucket with the given upper bound.
    pub fn cumulative_at(&self, upper_bound: f64) -> Option<u64> {
        self.buckets
            .iter()
            .find(|b| b.upper_bound == upper_bound)
            .map(|b| b.cumulative_count)
    }

    /// Estimated value for a captured quantile (e.g. `0.99`).
    pub fn quantile(&self, quantile: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|q| q.quantile == quantile)
            .map(|q| q.value)
    }
}

/// One estimated quantile.
///
/// The value is the upper bound of the bucket holding the target rank, so it
/// is `f64::INFINITY` when that rank is past the last boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileSnapshot {
    /// Target quantile in `0.0..=1.0`.
    pub quantile: f64,
    /// Estimated value in milliseconds.
    #[serde(serialize_with = "serialize_bound")]
    pub value: f64,
}

/// One cumulative bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSnapshot {
    /// Upper bound in milliseconds, `f64::INFINITY` for the last bucket.
    #[serde(serialize_with = "serialize_bound")]
    pub upper_bound: f64,
    /// Observations less than or equal to `upper_bound`.
    pub cumulative_count: u64,
}

/// Text form of a bucket bound, `+Inf` for the overflow bucket.
pub fn format_bound(bound: f64) -> String {
    if bound.is_infinite() {
        "+Inf".to_string()
    } else {
        bound.to_string()
    }
}

fn serialize_bound<S: Serializer>(bound: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if bound.is_infinite() {
        serializer.serialize_str("+Inf")
    } else {
        serializer.serialize_f64(*bound)
    }
}
