use crate::error::DomainResult;
use crate::types::{EnrichedRecord, RecordKind};
use async_trait::async_trait;

/// Per-record outcome of a persist call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Updated,
    /// A referenced key (tutor, student, session) is not in the store. The
    /// record is not retried blindly — the reference may never arrive — and
    /// callers must dead-letter it with full detail for reconciliation.
    SkippedMissingReference { detail: String },
    /// Transactional failure. The whole batch was rolled back; the caller
    /// re-presents it on redelivery since upserts are idempotent.
    Failed { detail: String },
}

/// Outcomes parallel to the input batch, same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchResult {
    pub fn persisted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Inserted | RecordOutcome::Updated))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Failed { .. }))
            .count()
    }
}

/// Upserts enriched records into the relational store. The only component of
/// the pipeline permitted to mutate it.
///
/// Contract:
/// - Reference checks run first; a missing reference marks only that record.
/// - Records passing checks are upserted by natural key inside one
///   transaction per batch. Any failure rolls the whole batch back (no
///   partial commits) and every upsert-phase record reports `Failed`.
/// - Upserts are full-row last-write-wins, so re-presenting a batch is safe.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn persist_batch(
        &self,
        kind: RecordKind,
        records: &[EnrichedRecord],
    ) -> DomainResult<BatchResult>;
}
