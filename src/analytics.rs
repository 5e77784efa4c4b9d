//! Latency histogram and per-page run statistics computed from cached pages.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::client::{AnalyticsSummary, Run, RunStatus};

/// Histogram bin width used by the run history view
pub const LATENCY_BUCKET_WIDTH_MS: u64 = 200;

/// Lower bound of the bin `latency_ms` falls into
pub fn bucket_start(latency_ms: u64, width_ms: u64) -> u64 {
    (latency_ms / width_ms) * width_ms
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyBucket {
    pub start_ms: u64,
    /// Inclusive upper bound
    pub end_ms: u64,
    pub count: usize,
}

impl LatencyBucket {
    pub fn label(&self) -> String {
        format!("{}-{}ms", self.start_ms, self.end_ms)
    }
}

impl fmt::Display for LatencyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.count)
    }
}

/// Count runs per latency bin, ascending, empty bins omitted.
///
/// `width_ms` must be non-zero.
pub fn latency_histogram<'a>(
    runs: impl IntoIterator<Item = &'a Run>,
    width_ms: u64,
) -> Vec<LatencyBucket> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for run in runs {
        *counts
            .entry(bucket_start(run.latency(), width_ms))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(start_ms, count)| LatencyBucket {
            start_ms,
            end_ms: start_ms + width_ms - 1,
            count,
        })
        .collect()
}

/// Summary of a fetched page, rounded the way the server rounds its totals.
///
/// Runs without a positive latency are left out of the average.
pub fn page_stats<'a>(runs: impl IntoIterator<Item = &'a Run>) -> AnalyticsSummary {
    let mut summary = AnalyticsSummary::default();
    let mut latency_total = 0u64;
    let mut latency_samples = 0u64;

    for run in runs {
        summary.total_runs += 1;
        match run.status {
            RunStatus::Success => summary.successes += 1,
            RunStatus::Failure => summary.failures += 1,
        }
        if run.latency() > 0 {
            latency_total += run.latency();
            latency_samples += 1;
        }
    }

    if summary.total_runs > 0 {
        summary.success_rate =
            round2(summary.successes as f64 * 100.0 / summary.total_runs as f64);
    }
    if latency_samples > 0 {
        summary.average_latency_ms = round2(latency_total as f64 / latency_samples as f64);
    }
    summary
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
