use crate::client::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

/// Migrations embedded at compile time and applied in order, tracked in a
/// `schema_migrations` table so reruns are no-ops.
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../migrations/0001_init.sql"))];

pub struct MigrationRunner {
    client: PostgresClient,
}

impl MigrationRunner {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .context("Failed to get connection for migrations")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await
        .context("Failed to create schema_migrations table")?;

        for (version, sql) in MIGRATIONS {
            let applied = conn
                .query_opt(
                    "SELECT version FROM schema_migrations WHERE version = $1",
                    &[version],
                )
                .await
                .context("Failed to query applied migrations")?
                .is_some();
            if applied {
                continue;
            }

            // Each migration lands atomically with its bookkeeping row.
            let tx = conn
                .transaction()
                .await
                .context("Failed to start migration transaction")?;
            tx.batch_execute(sql)
                .await
                .with_context(|| format!("Migration '{}' failed", version))?;
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES ($1)",
                &[version],
            )
            .await
            .context("Failed to record migration")?;
            tx.commit()
                .await
                .context("Failed to commit migration")?;

            info!(version = %version, "Applied migration");
        }

        Ok(())
    }
}
