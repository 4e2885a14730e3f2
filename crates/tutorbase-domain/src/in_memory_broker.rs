use crate::broker::{StreamBroker, StreamEntry};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const POLL_GRANULARITY: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct Pending {
    delivered_at: Instant,
    delivery_count: u32,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Index of the next never-delivered entry.
    cursor: usize,
    /// Delivered but not yet acknowledged, keyed by entry id.
    pending: HashMap<u64, Pending>,
    /// Reclaimed entries awaiting redelivery, with their prior count.
    requeued: VecDeque<(u64, u32)>,
}

#[derive(Debug, Default)]
struct StreamState {
    entries: Vec<(u64, Bytes)>,
    next_id: u64,
    groups: HashMap<String, GroupState>,
}

/// In-process [`StreamBroker`] honoring the full contract: ordered append,
/// competing consumer groups, explicit ack, pending-entry reclaim with
/// delivery counting. Backs the pipeline tests and single-process
/// deployments.
#[derive(Default)]
pub struct InMemoryBroker {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries ever appended to a stream.
    pub async fn stream_len(&self, stream: &str) -> usize {
        let streams = self.streams.lock().await;
        streams.get(stream).map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Entries delivered to the group but not yet acknowledged.
    pub async fn pending_count(&self, stream: &str, group: &str) -> usize {
        let streams = self.streams.lock().await;
        streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len() + g.requeued.len())
            .unwrap_or(0)
    }

    /// Snapshot of every payload in a stream, for test assertions.
    pub async fn read_all(&self, stream: &str) -> Vec<Bytes> {
        let streams = self.streams.lock().await;
        streams
            .get(stream)
            .map(|s| s.entries.iter().map(|(_, p)| p.clone()).collect())
            .unwrap_or_default()
    }

    fn try_deliver(state: &mut StreamState, group_name: &str, max_count: usize) -> Vec<StreamEntry> {
        let group = state.groups.entry(group_name.to_string()).or_default();
        let mut delivered = Vec::new();

        // Reclaimed entries go out first, with their count incremented.
        while delivered.len() < max_count {
            let Some((id, prior_count)) = group.requeued.pop_front() else {
                break;
            };
            let Ok(idx) = state.entries.binary_search_by_key(&id, |(eid, _)| *eid) else {
                continue;
            };
            let count = prior_count + 1;
            group.pending.insert(
                id,
                Pending {
                    delivered_at: Instant::now(),
                    delivery_count: count,
                },
            );
            delivered.push(StreamEntry {
                id: id.to_string(),
                delivery_count: count,
                payload: state.entries[idx].1.clone(),
            });
        }

        // Then never-delivered entries in append order.
        while delivered.len() < max_count && group.cursor < state.entries.len() {
            let (id, payload) = state.entries[group.cursor].clone();
            group.cursor += 1;
            group.pending.insert(
                id,
                Pending {
                    delivered_at: Instant::now(),
                    delivery_count: 1,
                },
            );
            delivered.push(StreamEntry {
                id: id.to_string(),
                delivery_count: 1,
                payload,
            });
        }

        delivered
    }
}

#[async_trait]
impl StreamBroker for InMemoryBroker {
    async fn publish(&self, stream: &str, payload: Bytes) -> Result<String> {
        let mut streams = self.streams.lock().await;
        let state = streams.entry(stream.to_string()).or_default();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push((id, payload));
        Ok(id.to_string())
    }

    async fn consume(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        max_count: usize,
        block_timeout: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let deadline = Instant::now() + block_timeout;
        loop {
            {
                let mut streams = self.streams.lock().await;
                let state = streams.entry(stream.to_string()).or_default();
                let delivered = Self::try_deliver(state, group, max_count);
                if !delivered.is_empty() {
                    return Ok(delivered);
                }
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(POLL_GRANULARITY).await;
        }
    }

    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<()> {
        let id: u64 = entry_id
            .parse()
            .map_err(|_| anyhow!("invalid entry id: {entry_id}"))?;
        let mut streams = self.streams.lock().await;
        if let Some(group_state) = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
        {
            group_state.pending.remove(&id);
        }
        Ok(())
    }

    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let mut streams = self.streams.lock().await;
        let Some(state) = streams.get_mut(stream) else {
            return Ok(Vec::new());
        };
        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let stuck: Vec<u64> = group_state
            .pending
            .iter()
            .filter(|(_, p)| p.delivered_at.elapsed() >= min_idle)
            .map(|(id, _)| *id)
            .collect();

        let mut reclaimed = Vec::new();
        for id in stuck {
            let Some(pending) = group_state.pending.remove(&id) else {
                continue;
            };
            group_state.requeued.push_back((id, pending.delivery_count));
            if let Ok(idx) = state.entries.binary_search_by_key(&id, |(eid, _)| *eid) {
                reclaimed.push(StreamEntry {
                    id: id.to_string(),
                    delivery_count: pending.delivery_count,
                    payload: state.entries[idx].1.clone(),
                });
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::CONSUMER_GROUP;

    const STREAM: &str = "stream.test";

    #[tokio::test]
    async fn test_publish_consume_ack() {
        let broker = InMemoryBroker::new();
        broker.publish(STREAM, Bytes::from("a")).await.unwrap();
        broker.publish(STREAM, Bytes::from("b")).await.unwrap();

        let entries = broker
            .consume(STREAM, CONSUMER_GROUP, "c1", 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, Bytes::from("a"));
        assert_eq!(entries[0].delivery_count, 1);
        assert_eq!(broker.pending_count(STREAM, CONSUMER_GROUP).await, 2);

        broker.ack(STREAM, CONSUMER_GROUP, &entries[0].id).await.unwrap();
        broker.ack(STREAM, CONSUMER_GROUP, &entries[1].id).await.unwrap();
        assert_eq!(broker.pending_count(STREAM, CONSUMER_GROUP).await, 0);
    }

    #[tokio::test]
    async fn test_entry_delivered_to_one_group_member() {
        let broker = InMemoryBroker::new();
        broker.publish(STREAM, Bytes::from("only")).await.unwrap();

        let first = broker
            .consume(STREAM, CONSUMER_GROUP, "c1", 10, Duration::ZERO)
            .await
            .unwrap();
        let second = broker
            .consume(STREAM, CONSUMER_GROUP, "c2", 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_reclaim_requeues_with_incremented_count() {
        let broker = InMemoryBroker::new();
        broker.publish(STREAM, Bytes::from("stuck")).await.unwrap();

        let first = broker
            .consume(STREAM, CONSUMER_GROUP, "crashed", 1, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(first[0].delivery_count, 1);

        // Consumer "crashed" without acking; reclaim makes it deliverable.
        let reclaimed = broker
            .reclaim(STREAM, CONSUMER_GROUP, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(reclaimed.len(), 1);

        let redelivered = broker
            .consume(STREAM, CONSUMER_GROUP, "healthy", 1, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(redelivered[0].id, first[0].id);
        assert_eq!(redelivered[0].delivery_count, 2);
    }

    #[tokio::test]
    async fn test_reclaim_respects_idle_threshold() {
        let broker = InMemoryBroker::new();
        broker.publish(STREAM, Bytes::from("fresh")).await.unwrap();
        broker
            .consume(STREAM, CONSUMER_GROUP, "c1", 1, Duration::ZERO)
            .await
            .unwrap();

        let reclaimed = broker
            .reclaim(STREAM, CONSUMER_GROUP, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(reclaimed.is_empty());
    }

    #[tokio::test]
    async fn test_consume_blocks_until_publish() {
        let broker = std::sync::Arc::new(InMemoryBroker::new());
        let consumer = broker.clone();
        let handle = tokio::spawn(async move {
            consumer
                .consume(STREAM, CONSUMER_GROUP, "c1", 1, Duration::from_secs(2))
                .await
                .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish(STREAM, Bytes::from("late")).await.unwrap();

        let entries = handle.await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_ack_is_idempotent() {
        let broker = InMemoryBroker::new();
        broker.publish(STREAM, Bytes::from("x")).await.unwrap();
        let entries = broker
            .consume(STREAM, CONSUMER_GROUP, "c1", 1, Duration::ZERO)
            .await
            .unwrap();
        broker.ack(STREAM, CONSUMER_GROUP, &entries[0].id).await.unwrap();
        broker.ack(STREAM, CONSUMER_GROUP, &entries[0].id).await.unwrap();
    }
}
