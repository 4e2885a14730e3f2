use crate::client::{jetstream_stream_name, NatsClient};
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use tutorbase_domain::{StreamBroker, StreamEntry};

struct Inflight {
    message: jetstream::Message,
    taken_at: Instant,
}

/// [`StreamBroker`] backed by NATS JetStream.
///
/// Consumer groups map to durable pull consumers: one durable per
/// (stream, group), shared by every worker fetching under that group name.
/// Unacked messages are redelivered by the server once `ack_wait` elapses,
/// which is also where the pipeline's delivery count comes from.
pub struct JetStreamBroker {
    jetstream: jetstream::Context,
    ack_wait: Duration,
    consumers: Mutex<HashMap<String, PullConsumer>>,
    inflight: Mutex<HashMap<String, Inflight>>,
}

impl JetStreamBroker {
    pub fn new(client: &NatsClient, ack_wait: Duration) -> Self {
        Self {
            jetstream: client.jetstream().clone(),
            ack_wait,
            consumers: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn consumer(&self, stream: &str, group: &str) -> Result<PullConsumer> {
        let key = format!("{}:{}", stream, group);
        let mut consumers = self.consumers.lock().await;
        if let Some(consumer) = consumers.get(&key) {
            return Ok(consumer.clone());
        }

        let consumer = self
            .jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(group.to_string()),
                    durable_name: Some(group.to_string()),
                    filter_subject: stream.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: self.ack_wait,
                    ..Default::default()
                },
                jetstream_stream_name(stream),
            )
            .await
            .context("Failed to create consumer")?;

        debug!(stream = %stream, group = %group, "Created durable pull consumer");
        consumers.insert(key, consumer.clone());
        Ok(consumer)
    }

    fn receipt_key(stream: &str, group: &str, entry_id: &str) -> String {
        format!("{}:{}:{}", stream, group, entry_id)
    }
}

#[async_trait]
impl StreamBroker for JetStreamBroker {
    async fn publish(&self, stream: &str, payload: Bytes) -> Result<String> {
        let ack = self
            .jetstream
            .publish(stream.to_string(), payload)
            .await
            .context("Failed to publish message")?
            .await
            .context("Failed to receive publish ack")?;
        Ok(ack.sequence.to_string())
    }

    async fn consume(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        max_count: usize,
        block_timeout: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let consumer = self.consumer(stream, group).await?;

        let mut messages = consumer
            .fetch()
            .max_messages(max_count)
            .expires(block_timeout)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut entries = Vec::new();
        let mut inflight = self.inflight.lock().await;
        while let Some(result) = messages.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Error receiving message from batch");
                    continue;
                }
            };
            let info = message
                .info()
                .map_err(|e| anyhow!("Failed to read message info: {}", e))?;
            let id = info.stream_sequence.to_string();
            entries.push(StreamEntry {
                id: id.clone(),
                delivery_count: info.delivered.max(1) as u32,
                payload: message.payload.clone(),
            });
            // Hold the message handle so a later ack can reach it.
            inflight.insert(
                Self::receipt_key(stream, group, &id),
                Inflight {
                    message,
                    taken_at: Instant::now(),
                },
            );
        }

        Ok(entries)
    }

    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<()> {
        let inflight = {
            let mut map = self.inflight.lock().await;
            map.remove(&Self::receipt_key(stream, group, entry_id))
        };
        match inflight {
            Some(entry) => entry
                .message
                .ack()
                .await
                .map_err(|e| anyhow!("Failed to ack message: {}", e)),
            // Unknown receipt: already acked, or held by a crashed worker.
            // The server will redeliver in the latter case.
            None => Ok(()),
        }
    }

    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
    ) -> Result<Vec<StreamEntry>> {
        // JetStream redelivers unacked messages itself once ack_wait passes;
        // reclaim only releases local handles that went stale so the map
        // cannot grow without bound. Redelivered entries surface through
        // consume with an incremented delivery count.
        let prefix = format!("{}:{}:", stream, group);
        let mut map = self.inflight.lock().await;
        let stale: Vec<String> = map
            .iter()
            .filter(|(key, entry)| key.starts_with(&prefix) && entry.taken_at.elapsed() >= min_idle)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            map.remove(key);
        }
        if !stale.is_empty() {
            debug!(stream = %stream, count = stale.len(), "Released stale message handles");
        }
        Ok(Vec::new())
    }
}
