use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters, injected into workers and aggregated by the caller.
/// One instance can be shared across all workers of a process (the fields
/// are atomics), or given per worker for isolated accounting in tests.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub consumed: AtomicU64,
    pub corrupted: AtomicU64,
    pub validation_failed: AtomicU64,
    pub validation_warnings: AtomicU64,
    pub enriched: AtomicU64,
    pub enrichment_failed: AtomicU64,
    pub inserted: AtomicU64,
    pub updated: AtomicU64,
    pub skipped_missing_reference: AtomicU64,
    pub retried: AtomicU64,
    pub dead_lettered: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub consumed: u64,
    pub corrupted: u64,
    pub validation_failed: u64,
    pub validation_warnings: u64,
    pub enriched: u64,
    pub enrichment_failed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped_missing_reference: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            validation_failed: self.validation_failed.load(Ordering::Relaxed),
            validation_warnings: self.validation_warnings.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            enrichment_failed: self.enrichment_failed.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            skipped_missing_reference: self.skipped_missing_reference.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
