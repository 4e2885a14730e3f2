use crate::client::PostgresClient;
use crate::models::{FeedbackRow, SessionRow, TutorRow};
use anyhow::Result;
use async_trait::async_trait;
use deadpool_postgres::Transaction;
use std::collections::HashSet;
use tracing::{debug, info};
use tutorbase_domain::{
    BatchResult, DomainError, DomainResult, EnrichedRecord, RecordKind, RecordOutcome,
    RecordRepository,
};

const UPSERT_TUTOR: &str = "INSERT INTO tutors \
     (tutor_id, full_name, email, hourly_rate, rate_band, experience_level, source, derived) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
     ON CONFLICT (tutor_id) DO UPDATE SET \
     full_name = EXCLUDED.full_name, email = EXCLUDED.email, \
     hourly_rate = EXCLUDED.hourly_rate, rate_band = EXCLUDED.rate_band, \
     experience_level = EXCLUDED.experience_level, source = EXCLUDED.source, \
     derived = EXCLUDED.derived, updated_at = now() \
     RETURNING (xmax = 0) AS inserted";

const UPSERT_SESSION: &str = "INSERT INTO sessions \
     (session_id, tutor_id, student_id, scheduled_start, attended, source, derived) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) \
     ON CONFLICT (session_id) DO UPDATE SET \
     tutor_id = EXCLUDED.tutor_id, student_id = EXCLUDED.student_id, \
     scheduled_start = EXCLUDED.scheduled_start, attended = EXCLUDED.attended, \
     source = EXCLUDED.source, derived = EXCLUDED.derived, updated_at = now() \
     RETURNING (xmax = 0) AS inserted";

const UPSERT_FEEDBACK: &str = "INSERT INTO feedback \
     (session_id, feedback_id, tutor_id, student_id, overall_rating, is_detractor, source, derived) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
     ON CONFLICT (session_id) DO UPDATE SET \
     feedback_id = EXCLUDED.feedback_id, tutor_id = EXCLUDED.tutor_id, \
     student_id = EXCLUDED.student_id, overall_rating = EXCLUDED.overall_rating, \
     is_detractor = EXCLUDED.is_detractor, source = EXCLUDED.source, \
     derived = EXCLUDED.derived, updated_at = now() \
     RETURNING (xmax = 0) AS inserted";

/// [`RecordRepository`] over PostgreSQL. One transaction per batch: reference
/// checks against committed state first, then idempotent full-row upserts,
/// with `(xmax = 0)` distinguishing inserts from updates.
#[derive(Clone)]
pub struct PostgresRecordRepository {
    client: PostgresClient,
}

impl PostgresRecordRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn existing_keys(
        tx: &Transaction<'_>,
        table: &str,
        column: &str,
        keys: &[String],
    ) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let query = format!("SELECT {column} FROM {table} WHERE {column} = ANY($1)");
        let rows = tx.query(&query, &[&keys]).await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Per-record missing-reference details, parallel to the batch. Checks
    /// run before any upsert, so rows staged earlier in the same batch do
    /// not satisfy a reference.
    async fn missing_references(
        tx: &Transaction<'_>,
        kind: RecordKind,
        records: &[EnrichedRecord],
    ) -> Result<Vec<Option<String>>> {
        let source_str = |record: &EnrichedRecord, field: &str| -> String {
            record
                .source
                .get(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let collect = |field: &str| -> Vec<String> {
            records.iter().map(|r| source_str(r, field)).collect()
        };

        match kind {
            RecordKind::Tutor => Ok(vec![None; records.len()]),
            RecordKind::Session => {
                let tutor_ids = collect("tutor_id");
                let student_ids = collect("student_id");
                let tutors = Self::existing_keys(tx, "tutors", "tutor_id", &tutor_ids).await?;
                let students =
                    Self::existing_keys(tx, "students", "student_id", &student_ids).await?;

                Ok(tutor_ids
                    .iter()
                    .zip(student_ids.iter())
                    .map(|(tutor_id, student_id)| {
                        if !tutors.contains(tutor_id) {
                            Some(format!("tutor '{}' not found", tutor_id))
                        } else if !students.contains(student_id) {
                            Some(format!("student '{}' not found", student_id))
                        } else {
                            None
                        }
                    })
                    .collect())
            }
            RecordKind::Feedback => {
                let session_ids = collect("session_id");
                let tutor_ids = collect("tutor_id");
                let student_ids = collect("student_id");
                let sessions =
                    Self::existing_keys(tx, "sessions", "session_id", &session_ids).await?;
                let tutors = Self::existing_keys(tx, "tutors", "tutor_id", &tutor_ids).await?;
                let students =
                    Self::existing_keys(tx, "students", "student_id", &student_ids).await?;

                Ok((0..records.len())
                    .map(|i| {
                        if !sessions.contains(&session_ids[i]) {
                            Some(format!("session '{}' not found", session_ids[i]))
                        } else if !tutors.contains(&tutor_ids[i]) {
                            Some(format!("tutor '{}' not found", tutor_ids[i]))
                        } else if !students.contains(&student_ids[i]) {
                            Some(format!("student '{}' not found", student_ids[i]))
                        } else {
                            None
                        }
                    })
                    .collect())
            }
        }
    }

    /// Upsert one record; returns true when the row was newly inserted.
    async fn upsert(
        tx: &Transaction<'_>,
        kind: RecordKind,
        record: &EnrichedRecord,
    ) -> Result<bool> {
        let row = match kind {
            RecordKind::Tutor => {
                let row = TutorRow::try_from(record)?;
                tx.query_one(
                    UPSERT_TUTOR,
                    &[
                        &row.tutor_id,
                        &row.full_name,
                        &row.email,
                        &row.hourly_rate,
                        &row.rate_band,
                        &row.experience_level,
                        &row.source,
                        &row.derived,
                    ],
                )
                .await?
            }
            RecordKind::Session => {
                let row = SessionRow::try_from(record)?;
                tx.query_one(
                    UPSERT_SESSION,
                    &[
                        &row.session_id,
                        &row.tutor_id,
                        &row.student_id,
                        &row.scheduled_start,
                        &row.attended,
                        &row.source,
                        &row.derived,
                    ],
                )
                .await?
            }
            RecordKind::Feedback => {
                let row = FeedbackRow::try_from(record)?;
                tx.query_one(
                    UPSERT_FEEDBACK,
                    &[
                        &row.session_id,
                        &row.feedback_id,
                        &row.tutor_id,
                        &row.student_id,
                        &row.overall_rating,
                        &row.is_detractor,
                        &row.source,
                        &row.derived,
                    ],
                )
                .await?
            }
        };
        Ok(row.get::<_, bool>(0))
    }
}

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    async fn persist_batch(
        &self,
        kind: RecordKind,
        records: &[EnrichedRecord],
    ) -> DomainResult<BatchResult> {
        if records.is_empty() {
            return Ok(BatchResult {
                outcomes: Vec::new(),
            });
        }

        debug!(kind = %kind, count = records.len(), "Persisting batch");

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let missing = Self::missing_references(&tx, kind, records)
            .await
            .map_err(DomainError::RepositoryError)?;
        let mut outcomes: Vec<Option<RecordOutcome>> = missing
            .into_iter()
            .map(|detail| detail.map(|detail| RecordOutcome::SkippedMissingReference { detail }))
            .collect();

        let mut upserted: Vec<(usize, bool)> = Vec::new();
        let mut failure: Option<String> = None;
        for (idx, record) in records.iter().enumerate() {
            if outcomes[idx].is_some() {
                continue;
            }
            match Self::upsert(&tx, kind, record).await {
                Ok(inserted) => upserted.push((idx, inserted)),
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let failure = match failure {
            Some(detail) => {
                let _ = tx.rollback().await;
                Some(detail)
            }
            None => tx.commit().await.err().map(|e| e.to_string()),
        };

        if let Some(detail) = failure {
            // Nothing committed; every record that reached the upsert phase
            // reports Failed so the caller re-presents the batch.
            for outcome in outcomes.iter_mut() {
                if outcome.is_none() {
                    *outcome = Some(RecordOutcome::Failed {
                        detail: detail.clone(),
                    });
                }
            }
        } else {
            for (idx, inserted) in upserted {
                outcomes[idx] = Some(if inserted {
                    RecordOutcome::Inserted
                } else {
                    RecordOutcome::Updated
                });
            }
        }

        let result = BatchResult {
            outcomes: outcomes.into_iter().flatten().collect(),
        };
        info!(
            kind = %kind,
            persisted = result.persisted_count(),
            failed = result.failed_count(),
            "Batch settled"
        );
        Ok(result)
    }
}
