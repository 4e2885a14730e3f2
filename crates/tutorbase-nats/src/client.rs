use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use tracing::info;

/// JetStream stream names cannot contain dots, so the pipeline's dotted
/// stream names ("stream.tutors") become underscored JetStream streams
/// ("stream_tutors") carrying the dotted name as their only subject.
pub fn jetstream_stream_name(stream: &str) -> String {
    stream.replace('.', "_")
}

pub struct NatsClient {
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!(url = %url, ?timeout, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client);

        info!("Successfully connected to NATS");
        Ok(Self { jetstream })
    }

    /// Create the backing JetStream stream for a pipeline stream if it does
    /// not exist yet.
    pub async fn ensure_stream(&self, stream: &str) -> Result<()> {
        let name = jetstream_stream_name(stream);

        let stream_config = StreamConfig {
            name: name.clone(),
            subjects: vec![stream.to_string()],
            description: Some(format!("Ingestion stream for subject '{}'", stream)),
            ..Default::default()
        };

        match self.jetstream.get_stream(&name).await {
            Ok(_) => {
                info!(stream = %name, "Stream already exists");
            }
            Err(_) => {
                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %name, subject = %stream, "Created stream");
            }
        }

        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_name_sanitization() {
        assert_eq!(jetstream_stream_name("stream.tutors"), "stream_tutors");
        assert_eq!(jetstream_stream_name("stream.dead_letter"), "stream_dead_letter");
        assert_eq!(jetstream_stream_name("plain"), "plain");
    }
}
