use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Single shared dead-letter stream for all kinds.
pub const DEAD_LETTER_STREAM: &str = "stream.dead_letter";

/// Consumer group shared by all pipeline workers of a stream. Horizontal
/// scaling is adding consumers to this group.
pub const CONSUMER_GROUP: &str = "pipeline-workers";

/// One entry as delivered by the broker. `delivery_count` counts deliveries
/// to the consumer group, including this one.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub delivery_count: u32,
    pub payload: Bytes,
}

/// Thin adapter over a durable, ordered, multi-consumer log.
///
/// The contract is append + consumer-group read with explicit
/// acknowledgment + pending-entry reclaim. No validation or business logic
/// belongs here.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Append a payload to a stream; returns the broker-assigned entry id.
    async fn publish(&self, stream: &str, payload: Bytes) -> Result<String>;

    /// Read up to `max_count` entries for a consumer group, blocking up to
    /// `block_timeout` when the stream has nothing deliverable. Redelivered
    /// entries carry an incremented `delivery_count`.
    async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block_timeout: Duration,
    ) -> Result<Vec<StreamEntry>>;

    /// Acknowledge an entry as fully handled for the group. Acking an
    /// already-acked or unknown entry is a no-op.
    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<()>;

    /// Re-queue entries that were delivered to a group member but never
    /// acknowledged within `min_idle` (crash recovery). Returns the entries
    /// made deliverable again.
    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
    ) -> Result<Vec<StreamEntry>>;
}
