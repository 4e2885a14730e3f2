use crate::error::DomainResult;
use crate::repository::{BatchResult, RecordOutcome, RecordRepository};
use crate::types::{EnrichedRecord, Payload, RecordKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    students: HashSet<String>,
    tutors: HashMap<String, Payload>,
    sessions: HashMap<String, Payload>,
    feedback: HashMap<String, Payload>,
}

impl Tables {
    fn table(&self, kind: RecordKind) -> &HashMap<String, Payload> {
        match kind {
            RecordKind::Tutor => &self.tutors,
            RecordKind::Session => &self.sessions,
            RecordKind::Feedback => &self.feedback,
        }
    }

    fn table_mut(&mut self, kind: RecordKind) -> &mut HashMap<String, Payload> {
        match kind {
            RecordKind::Tutor => &mut self.tutors,
            RecordKind::Session => &mut self.sessions,
            RecordKind::Feedback => &mut self.feedback,
        }
    }
}

/// In-process [`RecordRepository`] with the same semantics as the Postgres
/// implementation: reference checks against committed state, batch-atomic
/// staged commits, last-write-wins upserts. Supports failure injection so
/// tests can exercise rollback and retry paths.
#[derive(Default)]
pub struct InMemoryRecordRepository {
    tables: Mutex<Tables>,
    fail_on_key: Mutex<Option<String>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a student (students are written by a collaborator, not this
    /// pipeline — the pipeline only checks they exist).
    pub async fn add_student(&self, student_id: &str) {
        let mut tables = self.tables.lock().await;
        tables.students.insert(student_id.to_string());
    }

    /// Force every batch containing this natural key to fail at that record,
    /// simulating a transactional persistence failure.
    pub async fn set_fail_on_key(&self, key: Option<&str>) {
        let mut fail = self.fail_on_key.lock().await;
        *fail = key.map(str::to_string);
    }

    /// Committed row for a key, or None.
    pub async fn get(&self, kind: RecordKind, key: &str) -> Option<Payload> {
        let tables = self.tables.lock().await;
        tables.table(kind).get(key).cloned()
    }

    pub async fn count(&self, kind: RecordKind) -> usize {
        let tables = self.tables.lock().await;
        tables.table(kind).len()
    }

    fn missing_reference(tables: &Tables, record: &EnrichedRecord) -> Option<String> {
        let source_str = |field: &str| {
            record
                .source
                .get(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        match record.kind {
            RecordKind::Tutor => None,
            RecordKind::Session => {
                let tutor_id = source_str("tutor_id");
                let student_id = source_str("student_id");
                if !tables.tutors.contains_key(&tutor_id) {
                    Some(format!("tutor '{}' not found", tutor_id))
                } else if !tables.students.contains(&student_id) {
                    Some(format!("student '{}' not found", student_id))
                } else {
                    None
                }
            }
            RecordKind::Feedback => {
                let session_id = source_str("session_id");
                let tutor_id = source_str("tutor_id");
                let student_id = source_str("student_id");
                if !tables.sessions.contains_key(&session_id) {
                    Some(format!("session '{}' not found", session_id))
                } else if !tables.tutors.contains_key(&tutor_id) {
                    Some(format!("tutor '{}' not found", tutor_id))
                } else if !tables.students.contains(&student_id) {
                    Some(format!("student '{}' not found", student_id))
                } else {
                    None
                }
            }
        }
    }

    /// Full row as stored: source fields plus derived fields. The maps are
    /// disjoint by construction, so the merge never overwrites.
    fn merged_row(record: &EnrichedRecord) -> Payload {
        let mut row = record.source.clone();
        for (k, v) in &record.derived {
            row.insert(k.clone(), v.clone());
        }
        row
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn persist_batch(
        &self,
        kind: RecordKind,
        records: &[EnrichedRecord],
    ) -> DomainResult<BatchResult> {
        let mut tables = self.tables.lock().await;
        let fail_key = self.fail_on_key.lock().await.clone();

        // Phase 1: reference checks against committed state.
        let mut outcomes: Vec<Option<RecordOutcome>> = records
            .iter()
            .map(|record| {
                Self::missing_reference(&tables, record)
                    .map(|detail| RecordOutcome::SkippedMissingReference { detail })
            })
            .collect();

        // Phase 2: staged upserts; nothing lands until the whole batch does.
        let mut staged = tables.table(kind).clone();
        let mut upserted: Vec<(usize, RecordOutcome)> = Vec::new();
        let mut batch_failed = false;

        for (idx, record) in records.iter().enumerate() {
            if outcomes[idx].is_some() {
                continue;
            }
            if fail_key.as_deref() == Some(record.natural_key.as_str()) {
                batch_failed = true;
                break;
            }
            let outcome = if staged.contains_key(&record.natural_key) {
                RecordOutcome::Updated
            } else {
                RecordOutcome::Inserted
            };
            staged.insert(record.natural_key.clone(), Self::merged_row(record));
            upserted.push((idx, outcome));
        }

        if batch_failed {
            // Rollback: staged changes are discarded; every upsert-phase
            // record reports Failed so the caller re-presents the batch.
            for (idx, outcome) in outcomes.iter_mut().enumerate() {
                if outcome.is_none() {
                    *outcome = Some(RecordOutcome::Failed {
                        detail: format!("injected failure at '{}'", records[idx].natural_key),
                    });
                }
            }
        } else {
            *tables.table_mut(kind) = staged;
            for (idx, outcome) in upserted {
                outcomes[idx] = Some(outcome);
            }
        }

        Ok(BatchResult {
            outcomes: outcomes.into_iter().flatten().collect(),
        })
    }
}
