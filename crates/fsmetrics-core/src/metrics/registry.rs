//! Central metrics registry.
//!
//! The registry records operation latencies keyed by label tuple and exposes
//! them to a pull-based exporter. It is created empty, initialized exactly
//! once with a [`MetricsConfig`], and then shared by reference (usually via
//! [`SharedMetricRegistry`]) with every component that records latencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::counter::{Counter, SumCounter};
use super::histogram::Histogram;
use super::snapshot::{FamilySnapshot, MetricKind, RegistrySnapshot, SeriesSnapshot, SeriesValue};
use super::timer::LatencyTimer;
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::hostname::resolve_hostname;
use crate::units::{duration_to_millis, LATENCY_UNIT};

/// Histogram family of operation latencies.
pub const OPERATION_LATENCY_KEY: &str = "operation_duration";

/// Counter family of measurement counts.
pub const MEASUREMENT_COUNT_KEY: &str = "duration_measurements_count";

/// Counter family of measurement sums in milliseconds.
pub const MEASUREMENT_SUM_KEY: &str = "duration_measurements_sum";

/// Compose a fully qualified metric name.
///
/// Dashboards and alerts depend on this exact shape.
pub fn metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    format!("{namespace}_{subsystem}_{name}")
}

/// Registry lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// `initialize` has not completed successfully.
    Uninitialized,
    /// Families are registered; terminal for the process lifetime.
    Initialized,
}

/// Which aggregate of a series a family exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FamilySource {
    Latency,
    MeasurementCount,
    MeasurementSum,
}

/// A registered metric family.
#[derive(Debug, Clone)]
struct FamilyDescriptor {
    name: String,
    help: String,
    kind: MetricKind,
    source: FamilySource,
}

/// Schema fixed at initialization.
#[derive(Debug)]
struct Schema {
    config: MetricsConfig,
    buckets: Arc<[f64]>,
    label_names: Vec<String>,
    /// Resolved once; `Some` only when the host label is enabled.
    host: Option<String>,
    const_labels: Vec<(String, String)>,
}

impl Schema {
    fn build(config: MetricsConfig) -> Self {
        let host = config.host_label.then(resolve_hostname);
        let const_labels = config
            .const_labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            buckets: Arc::from(config.bucket_boundaries.as_slice()),
            label_names: config.label_names(),
            host,
            const_labels,
            config,
        }
    }

    fn extra_label_count(&self) -> usize {
        self.config.extra_labels.len()
    }

    fn label_values(&self, operation: &str, extra_labels: &[&str]) -> Vec<String> {
        let mut values = Vec::with_capacity(self.label_names.len());
        values.push(operation.to_string());
        values.extend(extra_labels.iter().map(|v| v.to_string()));
        if let Some(host) = &self.host {
            values.push(host.clone());
        }
        values
    }

    fn labels_for(&self, values: &[String]) -> Vec<(String, String)> {
        self.label_names
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .chain(self.const_labels.iter().cloned())
            .collect()
    }

    fn families(&self) -> Vec<FamilyDescriptor> {
        let ns = &self.config.namespace;
        let sub = &self.config.subsystem;
        let mut families = vec![FamilyDescriptor {
            name: metric_name(ns, sub, OPERATION_LATENCY_KEY),
            help: format!(
                "Latency in {LATENCY_UNIT} of snapshotter filesystem operations. Broken down by operation type."
            ),
            kind: MetricKind::Histogram,
            source: FamilySource::Latency,
        }];
        if self.config.track_totals {
            families.push(FamilyDescriptor {
                name: metric_name(ns, sub, MEASUREMENT_COUNT_KEY),
                help: "The total number of duration measurements.".to_string(),
                kind: MetricKind::Counter,
                source: FamilySource::MeasurementCount,
            });
            families.push(FamilyDescriptor {
                name: metric_name(ns, sub, MEASUREMENT_SUM_KEY),
                help: format!("The sum of duration measurements in {LATENCY_UNIT}."),
                kind: MetricKind::Counter,
                source: FamilySource::MeasurementSum,
            });
        }
        families
    }
}

/// Aggregates for one label tuple.
#[derive(Debug)]
struct OperationSeries {
    latency: Histogram,
    measurements: Option<(Counter, SumCounter)>,
}

impl OperationSeries {
    fn new(schema: &Schema) -> Self {
        Self {
            latency: Histogram::new(Arc::clone(&schema.buckets)),
            measurements: schema
                .config
                .track_totals
                .then(|| (Counter::new(), SumCounter::new())),
        }
    }

    fn observe(&self, value_ms: f64) {
        self.latency.observe(value_ms);
        if let Some((count, sum)) = &self.measurements {
            count.inc();
            sum.add(value_ms);
        }
    }

    fn value_for(&self, source: FamilySource) -> Option<SeriesValue> {
        match source {
            FamilySource::Latency => Some(SeriesValue::Histogram(self.latency.snapshot())),
            FamilySource::MeasurementCount => self
                .measurements
                .as_ref()
                .map(|(count, _)| SeriesValue::Counter(count.get() as f64)),
            FamilySource::MeasurementSum => self
                .measurements
                .as_ref()
                .map(|(_, sum)| SeriesValue::Counter(sum.get())),
        }
    }
}

/// Central registry for operation latency metrics.
pub struct MetricRegistry {
    schema: OnceLock<Schema>,
    init_lock: Mutex<()>,
    registrations: AtomicU64,
    families: RwLock<Vec<FamilyDescriptor>>,
    series: DashMap<Vec<String>, Arc<OperationSeries>>,
}

impl MetricRegistry {
    /// Create an uninitialized registry.
    pub fn new() -> Self {
        Self {
            schema: OnceLock::new(),
            init_lock: Mutex::new(()),
            registrations: AtomicU64::new(0),
            families: RwLock::new(Vec::new()),
            series: DashMap::new(),
        }
    }

    /// Create and initialize a registry in one step.
    pub fn with_config(config: MetricsConfig) -> Result<Self> {
        let registry = Self::new();
        registry.initialize(config)?;
        Ok(registry)
    }

    /// Validate the configuration and register the metric families.
    ///
    /// Only the first successful call does any work. Concurrent callers wait
    /// for it to finish; later calls return `Ok(())` without re-registering.
    /// An invalid configuration leaves the registry uninitialized.
    pub fn initialize(&self, config: MetricsConfig) -> Result<()> {
        if let Some(schema) = self.schema.get() {
            self.note_repeat_init(schema, &config);
            return Ok(());
        }

        let _guard = self.init_lock.lock();
        if let Some(schema) = self.schema.get() {
            self.note_repeat_init(schema, &config);
            return Ok(());
        }

        config.validate()?;
        let schema = Schema::build(config);
        for family in schema.families() {
            self.register_family(family)?;
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);

        info!(
            namespace = %schema.config.namespace,
            subsystem = %schema.config.subsystem,
            buckets = schema.buckets.len(),
            labels = ?schema.label_names,
            "metrics registry initialized"
        );

        // The init lock is held, so the cell is still empty here.
        let _ = self.schema.set(schema);
        Ok(())
    }

    fn note_repeat_init(&self, schema: &Schema, config: &MetricsConfig) {
        if &schema.config != config {
            warn!("metrics registry already initialized with a different config, ignoring");
        } else {
            debug!("metrics registry already initialized");
        }
    }

    fn register_family(&self, family: FamilyDescriptor) -> Result<()> {
        let mut families = self.families.write();
        if families.iter().any(|f| f.name == family.name) {
            return Err(Error::DuplicateRegistration(family.name));
        }
        debug!(name = %family.name, kind = family.kind.as_str(), "registered metric family");
        families.push(family);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RegistryState {
        if self.schema.get().is_some() {
            RegistryState::Initialized
        } else {
            RegistryState::Uninitialized
        }
    }

    /// Check whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.state() == RegistryState::Initialized
    }

    /// Number of times the registration step has run.
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Configuration the registry was initialized with.
    pub fn config(&self) -> Option<&MetricsConfig> {
        self.schema.get().map(|s| &s.config)
    }

    /// Ordered label schema, if initialized.
    pub fn label_names(&self) -> Option<&[String]> {
        self.schema.get().map(|s| s.label_names.as_slice())
    }

    /// Fully qualified names of the registered families.
    pub fn family_names(&self) -> Vec<String> {
        self.families.read().iter().map(|f| f.name.clone()).collect()
    }

    /// Number of distinct label tuples seen so far.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Record one elapsed duration for an operation.
    ///
    /// `extra_labels` must match the schema's extra dimensions exactly; the
    /// operation and host labels are filled in by the registry.
    pub fn record_latency(
        &self,
        operation: &str,
        elapsed: Duration,
        extra_labels: &[&str],
    ) -> Result<()> {
        self.record_millis(operation, duration_to_millis(elapsed), extra_labels)
    }

    /// Record one observation already expressed in milliseconds.
    pub fn record_millis(&self, operation: &str, millis: f64, extra_labels: &[&str]) -> Result<()> {
        let schema = self.schema.get().ok_or(Error::NotInitialized)?;
        if operation.is_empty() {
            return Err(Error::EmptyOperation);
        }
        if extra_labels.len() != schema.extra_label_count() {
            return Err(Error::LabelMismatch {
                expected: schema.extra_label_count(),
                actual: extra_labels.len(),
            });
        }
        if !millis.is_finite() || millis < 0.0 {
            return Err(Error::InvalidValue(millis));
        }

        let key = schema.label_values(operation, extra_labels);
        self.series_for(schema, key).observe(millis);
        Ok(())
    }

    fn series_for(&self, schema: &Schema, key: Vec<String>) -> Arc<OperationSeries> {
        if let Some(series) = self.series.get(&key) {
            return Arc::clone(series.value());
        }
        // Racing creators land on the same entry.
        match self.series.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                debug!(labels = ?entry.key(), "new metric series");
                let series = Arc::new(OperationSeries::new(schema));
                entry.insert(Arc::clone(&series));
                series
            }
        }
    }

    /// Record a duration, logging and dropping the observation on error.
    ///
    /// Use this on request paths: instrumentation never fails the caller.
    pub fn observe_latency(&self, operation: &str, elapsed: Duration, extra_labels: &[&str]) {
        if let Err(e) = self.record_latency(operation, elapsed, extra_labels) {
            warn!(operation, error = %e, "dropped latency observation");
        }
    }

    /// Record the time elapsed since `start`, logging and dropping on error.
    pub fn measure_latency(&self, operation: &str, start: Instant, extra_labels: &[&str]) {
        self.observe_latency(operation, start.elapsed(), extra_labels);
    }

    /// Start a timer that records into this registry when stopped or dropped.
    pub fn start_timer<'a>(&'a self, operation: &'a str) -> LatencyTimer<'a> {
        LatencyTimer::new(self, operation)
    }

    /// Capture every family and series.
    ///
    /// Each series is captured atomically; different series may be captured
    /// at slightly different moments.
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        let schema = self.schema.get().ok_or(Error::NotInitialized)?;

        let mut series: Vec<(Vec<String>, Arc<OperationSeries>)> = self
            .series
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        let families = self
            .families
            .read()
            .iter()
            .map(|family| FamilySnapshot {
                name: family.name.clone(),
                help: family.help.clone(),
                kind: family.kind,
                series: series
                    .iter()
                    .filter_map(|(values, agg)| {
                        agg.value_for(family.source).map(|value| SeriesSnapshot {
                            labels: schema.labels_for(values),
                            value,
                        })
                    })
                    .collect(),
            })
            .collect();

        Ok(RegistrySnapshot { families })
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> Result<String> {
        Ok(crate::export::encode_text(&self.snapshot()?))
    }

    /// Export the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot()?)?)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics registry handle.
pub type SharedMetricRegistry = Arc<MetricRegistry>;

/// Create a new, uninitialized shared registry.
pub fn new_shared_registry() -> SharedMetricRegistry {
    Arc::new(MetricRegistry::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small_config() -> MetricsConfig {
        MetricsConfig::new().with_buckets(vec![10.0, 50.0, 100.0])
    }

    fn latency_family(registry: &MetricRegistry) -> FamilySnapshot {
        let snapshot = registry.snapshot().unwrap();
        snapshot
            .family("stargz_fs_operation_duration")
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_uninitialized_fails_loudly() {
        let registry = MetricRegistry::new();
        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(matches!(
            registry.record_latency("mount", Duration::from_millis(1), &[]),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(registry.snapshot(), Err(Error::NotInitialized)));
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_initialize_once() {
        let registry = MetricRegistry::new();
        registry.initialize(small_config()).unwrap();
        registry.initialize(small_config()).unwrap();
        registry.initialize(MetricsConfig::new()).unwrap();

        assert_eq!(registry.state(), RegistryState::Initialized);
        assert_eq!(registry.registrations(), 1);
        // the first config wins
        assert_eq!(
            registry.config().map(|c| c.bucket_boundaries.clone()),
            Some(vec![10.0, 50.0, 100.0])
        );
        assert_eq!(
            registry.family_names(),
            vec![
                "stargz_fs_operation_duration",
                "stargz_fs_duration_measurements_count",
                "stargz_fs_duration_measurements_sum",
            ]
        );
    }

    #[test]
    fn test_invalid_config_leaves_uninitialized() {
        let registry = MetricRegistry::new();
        let err = registry
            .initialize(MetricsConfig::new().with_buckets(vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!registry.is_initialized());
        assert_eq!(registry.registrations(), 0);

        registry.initialize(small_config()).unwrap();
        assert!(registry.is_initialized());
        assert_eq!(registry.registrations(), 1);
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        let family = FamilyDescriptor {
            name: "stargz_fs_operation_duration".to_string(),
            help: String::new(),
            kind: MetricKind::Histogram,
            source: FamilySource::Latency,
        };
        assert!(matches!(
            registry.register_family(family),
            Err(Error::DuplicateRegistration(_))
        ));
    }

    #[test]
    fn test_record_single() {
        let registry = MetricRegistry::with_config(MetricsConfig::new()).unwrap();
        registry
            .record_latency("mount", Duration::from_micros(12_500), &[])
            .unwrap();

        let family = latency_family(&registry);
        let series = family.series_with(&[("operation_type", "mount")]).unwrap();
        let hist = series.histogram().unwrap();
        assert_eq!(hist.count, 1);
        assert!((hist.sum - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_example() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        for ms in [5, 15, 75, 200] {
            registry
                .record_latency("node_readdir", Duration::from_millis(ms), &[])
                .unwrap();
        }

        let family = latency_family(&registry);
        let hist = family.series[0].histogram().unwrap();
        assert_eq!(hist.cumulative_at(10.0), Some(1));
        assert_eq!(hist.cumulative_at(50.0), Some(2));
        assert_eq!(hist.cumulative_at(100.0), Some(3));
        assert_eq!(hist.cumulative_at(f64::INFINITY), Some(4));
        assert_eq!(hist.sum, 295.0);
        assert_eq!(hist.count, 4);
    }

    #[test]
    fn test_totals_track_histogram() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        registry.record_millis("mount", 3.0, &[]).unwrap();
        registry.record_millis("mount", 4.5, &[]).unwrap();

        let snapshot = registry.snapshot().unwrap();
        let count = snapshot
            .family("stargz_fs_duration_measurements_count")
            .and_then(|f| f.series_with(&[("operation_type", "mount")]))
            .and_then(|s| s.counter());
        let sum = snapshot
            .family("stargz_fs_duration_measurements_sum")
            .and_then(|f| f.series_with(&[("operation_type", "mount")]))
            .and_then(|s| s.counter());
        assert_eq!(count, Some(2.0));
        assert_eq!(sum, Some(7.5));
    }

    #[test]
    fn test_without_totals() {
        let registry =
            MetricRegistry::with_config(small_config().without_totals()).unwrap();
        registry.record_millis("mount", 1.0, &[]).unwrap();
        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.families.len(), 1);
    }

    #[test]
    fn test_label_mismatch() {
        let registry =
            MetricRegistry::with_config(small_config().with_extra_label("layer")).unwrap();
        assert!(matches!(
            registry.record_millis("mount", 1.0, &[]),
            Err(Error::LabelMismatch {
                expected: 1,
                actual: 0
            })
        ));
        assert!(matches!(
            registry.record_millis("mount", 1.0, &["a", "b"]),
            Err(Error::LabelMismatch {
                expected: 1,
                actual: 2
            })
        ));
        registry.record_millis("mount", 1.0, &["sha256:abc"]).unwrap();

        let family = latency_family(&registry);
        let series = family.series_with(&[("layer", "sha256:abc")]).unwrap();
        assert_eq!(series.label("operation_type"), Some("mount"));
    }

    #[test]
    fn test_empty_operation_and_bad_values() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        assert!(matches!(
            registry.record_millis("", 1.0, &[]),
            Err(Error::EmptyOperation)
        ));
        assert!(matches!(
            registry.record_millis("mount", -1.0, &[]),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            registry.record_millis("mount", f64::NAN, &[]),
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_observe_latency_never_fails() {
        let registry = MetricRegistry::new();
        // uninitialized: dropped silently apart from a log line
        registry.observe_latency("mount", Duration::from_millis(1), &[]);
        registry.measure_latency("mount", Instant::now(), &[]);

        registry.initialize(small_config()).unwrap();
        registry.observe_latency("mount", Duration::from_millis(1), &["extra"]);
        assert_eq!(registry.series_count(), 0);

        registry.observe_latency("mount", Duration::from_millis(1), &[]);
        assert_eq!(registry.series_count(), 1);
    }

    #[test]
    fn test_measure_latency_with_extra_labels() {
        let registry =
            MetricRegistry::with_config(small_config().with_extra_label("layer")).unwrap();
        let start = Instant::now();
        registry.measure_latency("remote_registry_get", start, &["sha256:abc"]);
        // wrong arity is dropped, not recorded under a partial tuple
        registry.measure_latency("remote_registry_get", start, &[]);

        assert_eq!(registry.series_count(), 1);
        let family = latency_family(&registry);
        let series = family.series_with(&[("layer", "sha256:abc")]).unwrap();
        assert_eq!(series.histogram().map(|h| h.count), Some(1));
    }

    #[test]
    fn test_snapshot_carries_quantiles() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        for _ in 0..90 {
            registry.record_millis("mount", 5.0, &[]).unwrap();
        }
        for _ in 0..10 {
            registry.record_millis("mount", 75.0, &[]).unwrap();
        }

        let family = latency_family(&registry);
        let hist = family.series[0].histogram().unwrap();
        assert_eq!(hist.quantile(0.5), Some(10.0));
        assert_eq!(hist.quantile(0.9), Some(10.0));
        assert_eq!(hist.quantile(0.99), Some(100.0));
    }

    #[test]
    fn test_host_and_const_labels() {
        let config = small_config()
            .with_host_label()
            .with_const_label("component", "file_system");
        let registry = MetricRegistry::with_config(config).unwrap();
        registry.record_millis("mount", 1.0, &[]).unwrap();

        assert_eq!(
            registry.label_names().map(|l| l.to_vec()),
            Some(vec!["operation_type".to_string(), "host".to_string()])
        );
        let family = latency_family(&registry);
        let series = &family.series[0];
        assert_eq!(series.label("host"), Some(resolve_hostname().as_str()));
        assert_eq!(series.label("component"), Some("file_system"));
    }

    #[test]
    fn test_series_sorted() {
        let registry = MetricRegistry::with_config(small_config()).unwrap();
        registry.record_millis("remote_registry_get", 1.0, &[]).unwrap();
        registry.record_millis("mount", 1.0, &[]).unwrap();
        registry.record_millis("node_readdir", 1.0, &[]).unwrap();

        let family = latency_family(&registry);
        let ops: Vec<_> = family
            .series
            .iter()
            .filter_map(|s| s.label("operation_type"))
            .collect();
        assert_eq!(ops, vec!["mount", "node_readdir", "remote_registry_get"]);
    }

    #[test]
    fn test_concurrent_new_series_single_entry() {
        let registry = Arc::new(MetricRegistry::with_config(small_config()).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.record_millis("mount", 1.0, &[]).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.series_count(), 1);
        let family = latency_family(&registry);
        assert_eq!(family.series[0].histogram().map(|h| h.count), Some(16));
    }

    #[test]
    fn test_shared_registry() {
        let registry = new_shared_registry();
        registry.initialize(small_config()).unwrap();
        registry.record_millis("mount", 1.0, &[]).unwrap();

        let registry2 = Arc::clone(&registry);
        registry2.record_millis("mount", 2.0, &[]).unwrap();

        let family = latency_family(&registry);
        assert_eq!(family.series[0].histogram().map(|h| h.count), Some(2));
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(
            metric_name("stargz", "fs", "operation_duration"),
            "stargz_fs_operation_duration"
        );
    }
}
