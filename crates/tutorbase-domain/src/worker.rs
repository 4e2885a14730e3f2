use crate::broker::{StreamBroker, StreamEntry, CONSUMER_GROUP};
use crate::dead_letter::DeadLetterProducer;
use crate::enrichment_engine::EnrichmentEngine;
use crate::repository::{BatchResult, RecordOutcome, RecordRepository};
use crate::stats::{bump, PipelineStats};
use crate::types::{EnrichedRecord, Envelope, FailureDetail, FailureReason, RecordKind};
use crate::validation_engine::ValidationEngine;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for one worker loop. Defaults match the deployment defaults:
/// batches of 10, one-second polls, three delivery attempts, reclaim after
/// sixty seconds idle.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub group: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub poll_timeout: Duration,
    pub max_delivery_attempts: u32,
    pub reclaim_min_idle: Duration,
    pub reclaim_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            group: CONSUMER_GROUP.to_string(),
            consumer_name: "ingest-worker".to_string(),
            batch_size: 10,
            poll_timeout: Duration::from_secs(1),
            max_delivery_attempts: 3,
            reclaim_min_idle: Duration::from_secs(60),
            reclaim_interval: Duration::from_secs(30),
        }
    }
}

/// Per-kind pipeline orchestrator: consume a batch, gate each message on its
/// checksum, validate, enrich, persist the surviving sub-batch in one call,
/// then ack or dead-letter per outcome.
///
/// Every failure path ends in either an ack (handled — persisted or
/// dead-lettered) or a deliberate non-ack (deferred to redelivery). Nothing
/// escapes the loop uncaught.
pub struct PipelineWorker {
    kind: RecordKind,
    broker: Arc<dyn StreamBroker>,
    repository: Arc<dyn RecordRepository>,
    validation: ValidationEngine,
    enrichment: EnrichmentEngine,
    dead_letters: DeadLetterProducer,
    stats: Arc<PipelineStats>,
    options: WorkerOptions,
}

impl PipelineWorker {
    pub fn new(
        kind: RecordKind,
        broker: Arc<dyn StreamBroker>,
        repository: Arc<dyn RecordRepository>,
        stats: Arc<PipelineStats>,
        options: WorkerOptions,
    ) -> Self {
        let dead_letters = DeadLetterProducer::new(broker.clone());
        Self {
            kind,
            broker,
            repository,
            validation: ValidationEngine::new(),
            enrichment: EnrichmentEngine::new(),
            dead_letters,
            stats,
            options,
        }
    }

    /// Main loop. Cancellation is honored between batches and while blocked
    /// on an empty stream; an in-flight batch always finishes
    /// validate/enrich/persist/ack so no message lingers consumed-but-unacked.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        let stream = self.kind.input_stream();
        info!(kind = %self.kind, stream = %stream, "Starting pipeline worker");

        loop {
            if ctx.is_cancelled() {
                break;
            }

            let entries = tokio::select! {
                _ = ctx.cancelled() => break,
                result = self.broker.consume(
                    stream,
                    &self.options.group,
                    &self.options.consumer_name,
                    self.options.batch_size,
                    self.options.poll_timeout,
                ) => match result {
                    Ok(entries) => entries,
                    Err(e) => {
                        error!(kind = %self.kind, error = %e, "Error consuming batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                }
            };

            if entries.is_empty() {
                continue;
            }

            if let Err(e) = self.process_entries(entries).await {
                // Consumed entries stay pending and will be reclaimed.
                error!(kind = %self.kind, error = %e, "Error processing batch");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        info!(kind = %self.kind, "Pipeline worker stopped gracefully");
        Ok(())
    }

    /// Periodic crash recovery: re-queue entries a consumer took but never
    /// acknowledged within the idle threshold. Runs separately from the main
    /// loop so a busy worker cannot starve recovery.
    pub async fn run_reclaim(&self, ctx: CancellationToken) -> Result<()> {
        let stream = self.kind.input_stream();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.options.reclaim_interval) => {
                    match self
                        .broker
                        .reclaim(stream, &self.options.group, self.options.reclaim_min_idle)
                        .await
                    {
                        Ok(reclaimed) if !reclaimed.is_empty() => {
                            info!(
                                kind = %self.kind,
                                count = reclaimed.len(),
                                "Re-queued stuck pending entries"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(kind = %self.kind, error = %e, "Error reclaiming pending entries");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// One consume + process cycle. Public so tests and embedders can drive
    /// the worker deterministically.
    pub async fn process_one_batch(&self) -> Result<usize> {
        let entries = self
            .broker
            .consume(
                self.kind.input_stream(),
                &self.options.group,
                &self.options.consumer_name,
                self.options.batch_size,
                self.options.poll_timeout,
            )
            .await?;
        if entries.is_empty() {
            return Ok(0);
        }
        self.process_entries(entries).await
    }

    async fn process_entries(&self, entries: Vec<StreamEntry>) -> Result<usize> {
        let count = entries.len();
        debug!(kind = %self.kind, count, "Processing batch");

        // Triage phase: checksum gate, validate, enrich. Failures are
        // dead-lettered and acked here; survivors move to persistence.
        let mut ready: Vec<(StreamEntry, Envelope, EnrichedRecord)> = Vec::new();
        for entry in entries {
            bump(&self.stats.consumed);
            if let Some(triaged) = self.triage(entry).await? {
                ready.push(triaged);
            }
        }

        if ready.is_empty() {
            return Ok(count);
        }

        // One transaction-backed persist call for the whole sub-batch. A
        // store-level error (connection, transaction begin) fails every
        // record in it; each then follows the normal retry budget below, so
        // an unreachable store still ends in retries_exhausted rather than
        // redelivering forever.
        let records: Vec<EnrichedRecord> = ready.iter().map(|(_, _, r)| r.clone()).collect();
        let result = match self.repository.persist_batch(self.kind, &records).await {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Batch persistence unavailable");
                BatchResult {
                    outcomes: ready
                        .iter()
                        .map(|_| RecordOutcome::Failed {
                            detail: format!("batch persistence failed: {}", e),
                        })
                        .collect(),
                }
            }
        };

        for ((entry, envelope, _), outcome) in ready.iter().zip(result.outcomes.iter()) {
            match outcome {
                RecordOutcome::Inserted => {
                    self.ack(&entry.id).await?;
                    bump(&self.stats.inserted);
                }
                RecordOutcome::Updated => {
                    self.ack(&entry.id).await?;
                    bump(&self.stats.updated);
                }
                RecordOutcome::SkippedMissingReference { detail } => {
                    // Not retried blindly: the reference may never arrive.
                    // Preserved in full for manual reconciliation and replay.
                    bump(&self.stats.skipped_missing_reference);
                    self.dead_letter_and_ack(
                        &entry.id,
                        Some(envelope.clone()),
                        FailureReason::SkippedMissingReference,
                        FailureDetail::Message(detail.clone()),
                    )
                    .await?;
                }
                RecordOutcome::Failed { detail } => {
                    if envelope.delivery_count >= self.options.max_delivery_attempts {
                        self.dead_letter_and_ack(
                            &entry.id,
                            Some(envelope.clone()),
                            FailureReason::RetriesExhausted,
                            FailureDetail::Message(detail.clone()),
                        )
                        .await?;
                    } else {
                        // Leave unacked; the broker redelivers after the
                        // idle threshold with an incremented count.
                        bump(&self.stats.retried);
                        warn!(
                            kind = %self.kind,
                            envelope_id = %envelope.id,
                            delivery_count = envelope.delivery_count,
                            detail = %detail,
                            "Transient persistence failure, leaving for redelivery"
                        );
                    }
                }
            }
        }

        Ok(count)
    }

    /// Decode, checksum-gate, validate, and enrich one entry. Returns None
    /// when the entry was dead-lettered (and acked) along the way.
    async fn triage(
        &self,
        entry: StreamEntry,
    ) -> Result<Option<(StreamEntry, Envelope, EnrichedRecord)>> {
        let mut envelope = match serde_json::from_slice::<Envelope>(&entry.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                bump(&self.stats.corrupted);
                self.dead_letter_and_ack(
                    &entry.id,
                    None,
                    FailureReason::Corruption,
                    FailureDetail::Message(format!("envelope decode failed: {}", e)),
                )
                .await?;
                return Ok(None);
            }
        };
        envelope.delivery_count = entry.delivery_count;

        // Corruption gate comes before any processing: a mismatch means the
        // bytes changed in transit, and retrying a deterministic mismatch
        // would loop forever.
        if !envelope.checksum_matches() {
            bump(&self.stats.corrupted);
            self.dead_letter_and_ack(
                &entry.id,
                Some(envelope),
                FailureReason::Corruption,
                FailureDetail::Message("payload checksum mismatch".to_string()),
            )
            .await?;
            return Ok(None);
        }

        let validation = self.validation.validate(self.kind, &envelope.payload);
        if validation.has_warnings() {
            bump(&self.stats.validation_warnings);
            debug!(
                kind = %self.kind,
                envelope_id = %envelope.id,
                warnings = validation.warnings.len(),
                "Record carries validation warnings"
            );
        }
        if !validation.valid {
            // Deterministic given the payload, so never retried.
            bump(&self.stats.validation_failed);
            self.dead_letter_and_ack(
                &entry.id,
                Some(envelope),
                FailureReason::ValidationFailed,
                FailureDetail::Validation(validation),
            )
            .await?;
            return Ok(None);
        }

        match self
            .enrichment
            .enrich(self.kind, &envelope.payload, envelope.enqueued_at)
        {
            Ok(record) => {
                bump(&self.stats.enriched);
                Ok(Some((entry, envelope, record)))
            }
            Err(e) => {
                // Contract drift between producer and pipeline; an operator
                // needs to look at this, not a retry loop.
                bump(&self.stats.enrichment_failed);
                self.dead_letter_and_ack(
                    &entry.id,
                    Some(envelope),
                    FailureReason::EnrichmentError,
                    FailureDetail::Message(e.to_string()),
                )
                .await?;
                Ok(None)
            }
        }
    }

    /// Dead-letter then ack. If the dead-letter publish fails the entry is
    /// left unacked so redelivery gets another chance to preserve it.
    async fn dead_letter_and_ack(
        &self,
        entry_id: &str,
        envelope: Option<Envelope>,
        reason: FailureReason,
        detail: FailureDetail,
    ) -> Result<()> {
        self.dead_letters
            .publish(envelope, self.kind.input_stream(), reason, detail)
            .await?;
        bump(&self.stats.dead_lettered);
        self.ack(entry_id).await
    }

    async fn ack(&self, entry_id: &str) -> Result<()> {
        self.broker
            .ack(self.kind.input_stream(), &self.options.group, entry_id)
            .await
    }
}
