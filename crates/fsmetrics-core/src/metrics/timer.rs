//! Scoped latency timer.

use std::time::{Duration, Instant};

use super::registry::MetricRegistry;

/// Measures one operation and records it when stopped or dropped.
///
/// Recording is fire-and-forget: failures are logged by the registry and
/// never reach the timed operation.
#[must_use = "a timer records when it is dropped; binding it to `_` stops it immediately"]
pub struct LatencyTimer<'a> {
    registry: &'a MetricRegistry,
    operation: &'a str,
    extra_labels: Vec<String>,
    start: Instant,
    armed: bool,
}

impl<'a> LatencyTimer<'a> {
    pub(crate) fn new(registry: &'a MetricRegistry, operation: &'a str) -> Self {
        Self {
            registry,
            operation,
            extra_labels: Vec::new(),
            start: Instant::now(),
            armed: true,
        }
    }

    /// Attach values for the schema's extra label dimensions.
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.extra_labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record now and return the measured duration.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    /// Drop the timer without recording.
    pub fn discard(mut self) {
        self.armed = false;
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if self.armed {
            self.armed = false;
            let labels: Vec<&str> = self.extra_labels.iter().map(String::as_str).collect();
            self.registry.observe_latency(self.operation, elapsed, &labels);
        }
        elapsed
    }
}

impl Drop for LatencyTimer<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MetricsConfig;
    use crate::metrics::MetricRegistry;

    fn count_for(registry: &MetricRegistry, op: &str) -> Option<u64> {
        registry
            .snapshot()
            .ok()?
            .family("stargz_fs_operation_duration")?
            .series_with(&[("operation_type", op)])?
            .histogram()
            .map(|h| h.count)
    }

    #[test]
    fn test_stop_records_once() {
        let registry = MetricRegistry::with_config(MetricsConfig::new()).unwrap();
        let timer = registry.start_timer("mount");
        let elapsed = timer.stop();

        assert_eq!(count_for(&registry, "mount"), Some(1));
        let hist = registry.snapshot().unwrap().families[0].series[0]
            .histogram()
            .cloned()
            .unwrap();
        assert!((hist.sum - crate::units::duration_to_millis(elapsed)).abs() < 1e-9);
    }

    #[test]
    fn test_drop_records() {
        let registry = MetricRegistry::with_config(MetricsConfig::new()).unwrap();
        {
            let _timer = registry.start_timer("node_readdir");
        }
        assert_eq!(count_for(&registry, "node_readdir"), Some(1));
    }

    #[test]
    fn test_discard_does_not_record() {
        let registry = MetricRegistry::with_config(MetricsConfig::new()).unwrap();
        registry.start_timer("mount").discard();
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_with_labels() {
        let config = MetricsConfig::new().with_extra_label("layer");
        let registry = MetricRegistry::with_config(config).unwrap();
        registry
            .start_timer("remote_registry_get")
            .with_labels(&["sha256:1"])
            .stop();
        // missing label value: dropped, not panicking
        registry.start_timer("remote_registry_get").stop();

        assert_eq!(registry.series_count(), 1);
        assert_eq!(count_for(&registry, "remote_registry_get"), Some(1));
    }
}
