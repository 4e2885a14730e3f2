use crate::enrichers;
use crate::error::EnrichmentError;
use crate::types::{EnrichedRecord, Payload, RecordKind};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Routes a validated payload to the enricher for its kind and assembles the
/// [`EnrichedRecord`]. Mirrors [`crate::validation_engine::ValidationEngine`]:
/// stateless, exhaustive dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentEngine;

impl EnrichmentEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn enrich(
        &self,
        kind: RecordKind,
        payload: &Payload,
        enqueued_at: DateTime<Utc>,
    ) -> Result<EnrichedRecord, EnrichmentError> {
        let derived = match kind {
            RecordKind::Tutor => enrichers::tutor::enrich(payload, enqueued_at)?,
            RecordKind::Session => enrichers::session::enrich(payload, enqueued_at)?,
            RecordKind::Feedback => enrichers::feedback::enrich(payload, enqueued_at)?,
        };

        debug!(
            kind = %kind,
            derived_fields = derived.len(),
            "Enriched record"
        );

        EnrichedRecord::new(kind, payload.clone(), derived)
    }
}
