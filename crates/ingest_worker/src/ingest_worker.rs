use crate::config::IngestConfig;
use crate::runner::AppProcess;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tutorbase_domain::{
    PipelineStats, PipelineWorker, RecordKind, RecordRepository, StreamBroker, DEAD_LETTER_STREAM,
};
use tutorbase_nats::{JetStreamBroker, NatsClient};
use tutorbase_postgres::{MigrationRunner, PostgresClient, PostgresRecordRepository};

const KINDS: [RecordKind; 3] = [RecordKind::Tutor, RecordKind::Session, RecordKind::Feedback];

/// Wires the full pipeline: NATS streams, the Postgres store (migrated on
/// startup), and one [`PipelineWorker`] per record kind sharing a stats
/// registry.
pub struct IngestWorker {
    workers: Vec<Arc<PipelineWorker>>,
    stats: Arc<PipelineStats>,
    stats_interval: Duration,
}

impl IngestWorker {
    pub async fn new(config: &IngestConfig) -> Result<Self> {
        info!("Initializing ingest worker");

        let nats = NatsClient::connect(&config.nats_url, config.startup_timeout()).await?;
        for kind in KINDS {
            nats.ensure_stream(kind.input_stream()).await?;
        }
        nats.ensure_stream(DEAD_LETTER_STREAM).await?;
        // The server's redelivery window doubles as the reclaim idle
        // threshold.
        let broker: Arc<dyn StreamBroker> = Arc::new(JetStreamBroker::new(
            &nats,
            Duration::from_secs(config.reclaim_idle_secs),
        ));

        let postgres = PostgresClient::new(
            &config.postgres_host,
            config.postgres_port,
            &config.postgres_database,
            &config.postgres_username,
            &config.postgres_password,
            config.postgres_pool_size,
        )
        .context("Failed to create PostgreSQL client")?;
        tokio::time::timeout(config.startup_timeout(), postgres.ping())
            .await
            .context("Timed out waiting for PostgreSQL")??;
        MigrationRunner::new(postgres.clone())
            .run_migrations()
            .await?;
        let repository: Arc<dyn RecordRepository> =
            Arc::new(PostgresRecordRepository::new(postgres));

        let stats = Arc::new(PipelineStats::new());
        let workers = KINDS
            .iter()
            .map(|&kind| {
                Arc::new(PipelineWorker::new(
                    kind,
                    broker.clone(),
                    repository.clone(),
                    stats.clone(),
                    config.worker_options(kind.as_str()),
                ))
            })
            .collect();

        info!("Ingest worker initialized");
        Ok(Self {
            workers,
            stats,
            stats_interval: Duration::from_secs(config.stats_interval_secs),
        })
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// One process per worker loop, one per reclaim loop, plus the periodic
    /// stats reporter.
    pub fn into_runner_processes(self) -> Vec<AppProcess> {
        let mut processes: Vec<AppProcess> = Vec::new();

        for worker in self.workers {
            let main_loop = worker.clone();
            processes.push(Box::new(move |ctx| {
                Box::pin(async move { main_loop.run(ctx).await })
            }));
            processes.push(Box::new(move |ctx| {
                Box::pin(async move { worker.run_reclaim(ctx).await })
            }));
        }

        let stats = self.stats;
        let interval = self.stats_interval;
        processes.push(Box::new(move |ctx| {
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            let snap = stats.snapshot();
                            info!(
                                consumed = snap.consumed,
                                inserted = snap.inserted,
                                updated = snap.updated,
                                retried = snap.retried,
                                dead_lettered = snap.dead_lettered,
                                validation_failed = snap.validation_failed,
                                "Pipeline stats"
                            );
                        }
                    }
                }
                Ok(())
            })
        }));

        processes
    }
}
