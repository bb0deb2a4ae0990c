//! Prometheus text exposition.

use std::fmt::Write;

use crate::metrics::{format_bound, FamilySnapshot, MetricKind, RegistrySnapshot, SeriesValue};
use crate::units::LATENCY_UNIT;

/// Encode a snapshot in the Prometheus text format.
pub fn encode_text(snapshot: &RegistrySnapshot) -> String {
    let mut out = String::new();
    for (i, family) in snapshot.families.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        encode_family(&mut out, family);
        if family.kind == MetricKind::Histogram {
            out.push('\n');
            encode_quantiles(&mut out, family);
        }
    }
    out
}

/// Bucket-estimated quantiles as a `{name}_quantile` gauge family.
fn encode_quantiles(out: &mut String, family: &FamilySnapshot) {
    let name = format!("{}_quantile", family.name);
    let _ = writeln!(
        out,
        "# HELP {name} Bucket-estimated quantiles of {} in {LATENCY_UNIT}.",
        family.name
    );
    let _ = writeln!(out, "# TYPE {name} gauge");

    for series in &family.series {
        let Some(hist) = series.histogram() else {
            continue;
        };
        for q in &hist.quantiles {
            let mut labels = series.labels.clone();
            labels.push(("quantile".to_string(), q.quantile.to_string()));
            let _ = writeln!(
                out,
                "{name}{} {}",
                label_set(&labels, None),
                format_bound(q.value)
            );
        }
    }
}

fn encode_family(out: &mut String, family: &FamilySnapshot) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# HELP {} {}", family.name, escape_help(&family.help));
    let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind.as_str());

    for series in &family.series {
        match &series.value {
            SeriesValue::Histogram(hist) => {
                for bucket in &hist.buckets {
                    let le = format_bound(bucket.upper_bound);
                    let _ = writeln!(
                        out,
                        "{}_bucket{} {}",
                        family.name,
                        label_set(&series.labels, Some(&le)),
                        bucket.cumulative_count
                    );
                }
                let labels = label_set(&series.labels, None);
                let _ = writeln!(out, "{}_sum{} {}", family.name, labels, hist.sum);
                let _ = writeln!(out, "{}_count{} {}", family.name, labels, hist.count);
            }
            SeriesValue::Counter(value) => {
                let _ = writeln!(
                    out,
                    "{}{} {}",
                    family.name,
                    label_set(&series.labels, None),
                    value
                );
            }
        }
    }
}

fn label_set(labels: &[(String, String)], le: Option<&str>) -> String {
    if labels.is_empty() && le.is_none() {
        return String::new();
    }
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }
    format!("{{{}}}", parts.join(","))
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
