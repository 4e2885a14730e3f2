use crate::broker::{StreamBroker, DEAD_LETTER_STREAM};
use crate::types::{DeadLetterEntry, Envelope, FailureDetail, FailureReason};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// Publishes [`DeadLetterEntry`] records to the shared dead-letter stream.
#[derive(Clone)]
pub struct DeadLetterProducer {
    broker: Arc<dyn StreamBroker>,
}

impl DeadLetterProducer {
    pub fn new(broker: Arc<dyn StreamBroker>) -> Self {
        Self { broker }
    }

    /// Build and publish an entry. `envelope` is None only when the stream
    /// bytes did not decode into an envelope at all.
    pub async fn publish(
        &self,
        envelope: Option<Envelope>,
        source_stream: &str,
        failure_reason: FailureReason,
        failure_detail: FailureDetail,
    ) -> Result<String> {
        let entry = DeadLetterEntry {
            envelope,
            failed_at: Utc::now(),
            source_stream: source_stream.to_string(),
            failure_reason,
            failure_detail,
        };

        warn!(
            source_stream = %entry.source_stream,
            failure_reason = %entry.failure_reason,
            envelope_id = ?entry.envelope.as_ref().map(|e| e.id),
            "Dead-lettering message"
        );

        let bytes = serde_json::to_vec(&entry).context("Failed to serialize dead-letter entry")?;
        self.broker
            .publish(DEAD_LETTER_STREAM, bytes.into())
            .await
            .context("Failed to publish dead-letter entry")
    }
}
