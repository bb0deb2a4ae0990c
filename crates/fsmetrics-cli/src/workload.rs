//! Synthetic snapshotter workload.
//!
//! Each worker thread picks random filesystem operations and records a
//! latency drawn from a per-operation range, the way the mount, fetch and
//! readdir handlers would report real timings.

use std::thread;

use fsmetrics_core::{FsOperation, SharedMetricRegistry};
use rand::Rng;
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Latency range in milliseconds for an operation.
fn latency_range(op: FsOperation) -> std::ops::Range<f64> {
    match op {
        FsOperation::Mount => 5.0..400.0,
        FsOperation::RemoteRegistryGet => 1.0..20_000.0,
        FsOperation::NodeReaddir => 0.05..8.0,
    }
}

/// Summary of a workload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadSummary {
    /// Observations submitted across all workers.
    pub submitted: u64,
}

/// Run `workers` threads of `iterations` observations each.
pub fn run(registry: &SharedMetricRegistry, workers: usize, iterations: usize) -> Result<WorkloadSummary> {
    info!(workers, iterations, "starting synthetic workload");

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let registry = SharedMetricRegistry::clone(registry);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..iterations {
                    let op = FsOperation::ALL[rng.gen_range(0..FsOperation::ALL.len())];
                    let millis = rng.gen_range(latency_range(op));
                    if let Err(e) = registry.record_millis(op.as_str(), millis, &[]) {
                        debug!(worker, error = %e, "observation rejected");
                    }
                }
                debug!(worker, "worker finished");
            })
        })
        .collect();

    for (worker, handle) in handles.into_iter().enumerate() {
        handle.join().map_err(|_| CliError::WorkerPanicked(worker))?;
    }

    let summary = WorkloadSummary {
        submitted: (workers * iterations) as u64,
    };
    info!(submitted = summary.submitted, "workload complete");
    Ok(summary)
}
