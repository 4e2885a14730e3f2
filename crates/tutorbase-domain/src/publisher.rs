use crate::broker::StreamBroker;
use crate::types::{Envelope, Payload, RecordKind};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Wraps a raw payload in a publish-ready [`Envelope`] (fresh id, enqueue
/// timestamp, checksum) and appends it to the kind's input stream.
///
/// In production the upstream HTTP ingestion service is the publisher; this
/// type implements the same contract for tests, demos, and replay tooling.
#[derive(Clone)]
pub struct EnvelopePublisher {
    broker: Arc<dyn StreamBroker>,
}

impl EnvelopePublisher {
    pub fn new(broker: Arc<dyn StreamBroker>) -> Self {
        Self { broker }
    }

    pub async fn publish(&self, kind: RecordKind, payload: Payload) -> Result<Uuid> {
        let envelope = Envelope::new(kind, payload);
        let id = envelope.id;
        let bytes = serde_json::to_vec(&envelope).context("Failed to serialize envelope")?;

        self.broker
            .publish(kind.input_stream(), bytes.into())
            .await
            .context("Failed to publish envelope")?;

        debug!(kind = %kind, envelope_id = %id, "Published envelope");
        Ok(id)
    }
}
