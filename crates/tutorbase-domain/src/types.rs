use crate::checksum::payload_checksum;
use crate::error::EnrichmentError;
use crate::validation::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat key/value payload as produced upstream. serde_json's default map is
/// ordered by key, so serializing it is deterministic — the checksum relies
/// on that.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The three record kinds the pipeline ingests. Routing is an exhaustive
/// match everywhere, so adding a kind is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Tutor,
    Session,
    Feedback,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Tutor => "tutor",
            RecordKind::Session => "session",
            RecordKind::Feedback => "feedback",
        }
    }

    /// Input stream this kind is published to.
    pub fn input_stream(&self) -> &'static str {
        match self {
            RecordKind::Tutor => "stream.tutors",
            RecordKind::Session => "stream.sessions",
            RecordKind::Feedback => "stream.feedback",
        }
    }

    /// Payload field holding the record's natural key.
    pub fn natural_key_field(&self) -> &'static str {
        match self {
            RecordKind::Tutor => "tutor_id",
            // Feedback is unique per session, so the session is the key.
            RecordKind::Session | RecordKind::Feedback => "session_id",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit moved through the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub kind: RecordKind,
    pub payload: Payload,
    pub enqueued_at: DateTime<Utc>,
    /// Hex SHA-256 over the canonical JSON serialization of `payload`.
    pub checksum: String,
    /// Times the broker has delivered this entry to the consumer group.
    /// Publishers write 0; the consuming worker overlays the broker's count.
    #[serde(default)]
    pub delivery_count: u32,
}

impl Envelope {
    /// Build a publish-ready envelope: fresh UUIDv7 id, enqueue timestamp,
    /// checksum computed over the payload.
    pub fn new(kind: RecordKind, payload: Payload) -> Self {
        let checksum = payload_checksum(&payload);
        Self {
            id: Uuid::now_v7(),
            kind,
            payload,
            enqueued_at: Utc::now(),
            checksum,
            delivery_count: 0,
        }
    }

    /// Whether the stored checksum matches a recomputation over the payload.
    /// A mismatch is transport corruption, not a validation failure.
    pub fn checksum_matches(&self) -> bool {
        payload_checksum(&self.payload) == self.checksum
    }
}

/// Validated payload plus derived fields. Derived fields live in their own
/// map and never overwrite source fields; enriching the same source payload
/// twice yields identical derived maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub kind: RecordKind,
    pub natural_key: String,
    pub source: Payload,
    pub derived: Payload,
}

impl EnrichedRecord {
    /// Assemble from a validated source payload and its derived fields.
    /// The natural key is guaranteed by validation; its absence here is a
    /// contract error, not a data error.
    pub fn new(kind: RecordKind, source: Payload, derived: Payload) -> Result<Self, EnrichmentError> {
        let key_field = kind.natural_key_field();
        let natural_key = source
            .get(key_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| EnrichmentError::missing(key_field))?
            .to_string();
        Ok(Self {
            kind,
            natural_key,
            source,
            derived,
        })
    }
}

/// Why a message left the pipeline through the dead-letter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Corruption,
    ValidationFailed,
    EnrichmentError,
    SkippedMissingReference,
    RetriesExhausted,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::Corruption => "corruption",
            FailureReason::ValidationFailed => "validation_failed",
            FailureReason::EnrichmentError => "enrichment_error",
            FailureReason::SkippedMissingReference => "skipped_missing_reference",
            FailureReason::RetriesExhausted => "retries_exhausted",
        };
        f.write_str(s)
    }
}

/// Structured detail accompanying a dead-letter entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureDetail {
    Validation(ValidationResult),
    Message(String),
}

/// A message the pipeline gave up on, preserved for inspection and replay.
/// `envelope` is None only when the entry bytes did not decode at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub envelope: Option<Envelope>,
    pub failed_at: DateTime<Utc>,
    pub source_stream: String,
    pub failure_reason: FailureReason,
    pub failure_detail: FailureDetail,
}
