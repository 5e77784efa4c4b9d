//! In-process counters for cache and mutation traffic

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    fetches_started: AtomicU64,
    reads_coalesced: AtomicU64,
    responses_discarded: AtomicU64,
    fetches_failed: AtomicU64,
    invalidations: AtomicU64,
    mutations_succeeded: AtomicU64,
    mutations_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "fetches_started", "Metric incremented");
    }

    pub fn read_coalesced(&self) {
        self.reads_coalesced.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "reads_coalesced", "Metric incremented");
    }

    pub fn response_discarded(&self) {
        self.responses_discarded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "responses_discarded", "Metric incremented");
    }

    pub fn fetch_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "fetches_failed", "Metric incremented");
    }

    pub fn invalidated(&self, entries: u64) {
        self.invalidations.fetch_add(entries, Ordering::Relaxed);
        tracing::trace!(counter = "invalidations", entries, "Metric incremented");
    }

    pub fn mutation_succeeded(&self) {
        self.mutations_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "mutations_succeeded", "Metric incremented");
    }

    pub fn mutation_failed(&self) {
        self.mutations_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "mutations_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            reads_coalesced: self.reads_coalesced.load(Ordering::Relaxed),
            responses_discarded: self.responses_discarded.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            mutations_succeeded: self.mutations_succeeded.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fetches_started: u64,
    pub reads_coalesced: u64,
    pub responses_discarded: u64,
    pub fetches_failed: u64,
    pub invalidations: u64,
    pub mutations_succeeded: u64,
    pub mutations_failed: u64,
}
