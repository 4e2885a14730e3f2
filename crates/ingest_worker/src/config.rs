use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;
use tutorbase_domain::{WorkerOptions, CONSUMER_GROUP};

/// Worker configuration, read from `TUTORBASE_`-prefixed environment
/// variables with per-field defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub log_json: bool,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Durable consumer name, shared across the worker's streams
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Messages fetched per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long a poll blocks on an empty stream, in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Deliveries before a persistently failing message is dead-lettered
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// Idle seconds before a pending entry counts as abandoned
    #[serde(default = "default_reclaim_idle_secs")]
    pub reclaim_idle_secs: u64,

    /// Seconds between reclaim sweeps
    #[serde(default = "default_reclaim_interval_secs")]
    pub reclaim_interval_secs: u64,

    /// Seconds between pipeline stats log lines
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    /// Startup timeout for connecting to NATS and PostgreSQL, in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum connections in the pool
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("TUTORBASE"))
            .build()?;
        config.try_deserialize()
    }

    pub fn worker_options(&self, kind_label: &str) -> WorkerOptions {
        WorkerOptions {
            group: CONSUMER_GROUP.to_string(),
            consumer_name: format!("{}-{}", self.consumer_name, kind_label),
            batch_size: self.batch_size,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            max_delivery_attempts: self.max_delivery_attempts,
            reclaim_min_idle: Duration::from_secs(self.reclaim_idle_secs),
            reclaim_interval: Duration::from_secs(self.reclaim_interval_secs),
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_consumer_name() -> String {
    "ingest-worker".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_max_delivery_attempts() -> u32 {
    3
}

fn default_reclaim_idle_secs() -> u64 {
    60
}

fn default_reclaim_interval_secs() -> u64 {
    30
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_startup_timeout_secs() -> u64 {
    10
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "tutorbase".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_password() -> String {
    "postgres".to_string()
}

fn default_postgres_pool_size() -> usize {
    5
}
