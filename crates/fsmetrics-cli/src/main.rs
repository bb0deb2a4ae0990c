//! fsmetrics - Synthetic workload driver for the operation metrics registry.

mod args;
mod error;
mod workload;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fsmetrics_core::new_shared_registry;

use crate::args::{Args, OutputFormat};

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fsmetrics=info,fsmetrics_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!(error = %e, "fsmetrics failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> error::Result<()> {
    let workers = args.workers.max(1);
    let iterations = args.iterations;
    let format = args.format;
    let config = args.into_config()?;

    tracing::info!(
        namespace = %config.namespace,
        subsystem = %config.subsystem,
        buckets = config.bucket_boundaries.len(),
        "configuration loaded"
    );

    // Fail fast on a bad schema before any workload starts.
    let registry = new_shared_registry();
    registry.initialize(config)?;

    workload::run(&registry, workers, iterations)?;

    let output = match format {
        OutputFormat::Text => registry.to_prometheus()?,
        OutputFormat::Json => registry.to_json()?,
    };
    println!("{output}");
    Ok(())
}
