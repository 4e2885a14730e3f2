#![cfg(feature = "integration-tests")]

use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tutorbase_domain::{EnrichedRecord, Payload, RecordKind, RecordOutcome, RecordRepository};
use tutorbase_postgres::{MigrationRunner, PostgresClient, PostgresRecordRepository};

async fn setup_test_db() -> (
    ContainerAsync<Postgres>,
    PostgresClient,
    PostgresRecordRepository,
) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&host.to_string(), port, "postgres", "postgres", "postgres", 5)
        .expect("Failed to create client");

    MigrationRunner::new(client.clone())
        .run_migrations()
        .await
        .expect("Migrations failed");

    let repository = PostgresRecordRepository::new(client.clone());
    (postgres, client, repository)
}

async fn seed_student(client: &PostgresClient, student_id: &str) {
    let conn = client.get_connection().await.unwrap();
    conn.execute(
        "INSERT INTO students (student_id) VALUES ($1) ON CONFLICT DO NOTHING",
        &[&student_id],
    )
    .await
    .unwrap();
}

fn tutor_record(key: &str, rate: f64) -> EnrichedRecord {
    let mut source = Payload::new();
    source.insert("tutor_id".to_string(), json!(key));
    source.insert("full_name".to_string(), json!("Grace Hopper"));
    source.insert("email".to_string(), json!("grace@example.com"));
    source.insert("hourly_rate".to_string(), json!(rate));
    let mut derived = Payload::new();
    derived.insert("rate_band".to_string(), json!("standard"));
    derived.insert("experience_level".to_string(), json!("senior"));
    EnrichedRecord::new(RecordKind::Tutor, source, derived).unwrap()
}

fn session_record(key: &str, tutor: &str, student: &str) -> EnrichedRecord {
    let mut source = Payload::new();
    source.insert("session_id".to_string(), json!(key));
    source.insert("tutor_id".to_string(), json!(tutor));
    source.insert("student_id".to_string(), json!(student));
    source.insert("scheduled_start".to_string(), json!("2026-03-02T14:00:00Z"));
    source.insert("scheduled_end".to_string(), json!("2026-03-02T15:00:00Z"));
    let mut derived = Payload::new();
    derived.insert("attended".to_string(), json!(true));
    derived.insert("scheduled_duration_minutes".to_string(), json!(60));
    EnrichedRecord::new(RecordKind::Session, source, derived).unwrap()
}

#[tokio::test]
async fn test_insert_then_update_by_natural_key() {
    let (_container, client, repo) = setup_test_db().await;

    let first = repo
        .persist_batch(RecordKind::Tutor, &[tutor_record("tutor-1", 45.0)])
        .await
        .unwrap();
    assert_eq!(first.outcomes, vec![RecordOutcome::Inserted]);

    let second = repo
        .persist_batch(RecordKind::Tutor, &[tutor_record("tutor-1", 55.0)])
        .await
        .unwrap();
    assert_eq!(second.outcomes, vec![RecordOutcome::Updated]);

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT hourly_rate, (SELECT count(*) FROM tutors) FROM tutors WHERE tutor_id = $1",
            &[&"tutor-1"],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, f64>(0), 55.0, "last write wins");
    assert_eq!(row.get::<_, i64>(1), 1);
}

#[tokio::test]
async fn test_missing_reference_skips_only_that_record() {
    let (_container, client, repo) = setup_test_db().await;
    seed_student(&client, "stud-1").await;
    repo.persist_batch(RecordKind::Tutor, &[tutor_record("tutor-1", 45.0)])
        .await
        .unwrap();

    let batch = vec![
        session_record("sess-1", "tutor-1", "stud-1"),
        session_record("sess-2", "ghost-tutor", "stud-1"),
    ];
    let result = repo
        .persist_batch(RecordKind::Session, &batch)
        .await
        .unwrap();

    assert_eq!(result.outcomes[0], RecordOutcome::Inserted);
    assert!(matches!(
        &result.outcomes[1],
        RecordOutcome::SkippedMissingReference { detail } if detail.contains("ghost-tutor")
    ));

    let conn = client.get_connection().await.unwrap();
    let count: i64 = conn
        .query_one("SELECT count(*) FROM sessions", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_batch_rolls_back_as_a_unit() {
    let (_container, client, repo) = setup_test_db().await;

    // Second record breaks the conversion contract (no derived fields), so
    // the batch aborts mid-upsert.
    let mut source = Payload::new();
    source.insert("tutor_id".to_string(), json!("tutor-2"));
    source.insert("full_name".to_string(), json!("No Derived"));
    source.insert("email".to_string(), json!("nd@example.com"));
    source.insert("hourly_rate".to_string(), json!(30.0));
    let broken = EnrichedRecord::new(RecordKind::Tutor, source, Payload::new()).unwrap();
    let batch = vec![tutor_record("tutor-1", 45.0), broken];

    let result = repo.persist_batch(RecordKind::Tutor, &batch).await.unwrap();
    assert_eq!(result.failed_count(), 2, "all upsert-phase records fail");

    let conn = client.get_connection().await.unwrap();
    let count: i64 = conn
        .query_one("SELECT count(*) FROM tutors", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 0, "no partial commits");
}

fn feedback_record(session: &str, rating: i32) -> EnrichedRecord {
    let mut source = Payload::new();
    source.insert("feedback_id".to_string(), json!(format!("fb-{session}")));
    source.insert("session_id".to_string(), json!(session));
    source.insert("tutor_id".to_string(), json!("tutor-1"));
    source.insert("student_id".to_string(), json!("stud-1"));
    source.insert("overall_rating".to_string(), json!(rating));
    let mut derived = Payload::new();
    derived.insert("is_detractor".to_string(), json!(rating <= 2));
    EnrichedRecord::new(RecordKind::Feedback, source, derived).unwrap()
}

#[tokio::test]
async fn test_feedback_is_keyed_by_session() {
    let (_container, client, repo) = setup_test_db().await;
    seed_student(&client, "stud-1").await;
    repo.persist_batch(RecordKind::Tutor, &[tutor_record("tutor-1", 45.0)])
        .await
        .unwrap();
    repo.persist_batch(
        RecordKind::Session,
        &[session_record("sess-1", "tutor-1", "stud-1")],
    )
    .await
    .unwrap();

    let first = repo
        .persist_batch(RecordKind::Feedback, &[feedback_record("sess-1", 4)])
        .await
        .unwrap();
    assert_eq!(first.outcomes, vec![RecordOutcome::Inserted]);

    // A revised submission for the same session replaces the earlier one.
    let second = repo
        .persist_batch(RecordKind::Feedback, &[feedback_record("sess-1", 2)])
        .await
        .unwrap();
    assert_eq!(second.outcomes, vec![RecordOutcome::Updated]);

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT overall_rating, is_detractor, (SELECT count(*) FROM feedback) \
             FROM feedback WHERE session_id = $1",
            &[&"sess-1"],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, i32>(0), 2);
    assert!(row.get::<_, bool>(1));
    assert_eq!(row.get::<_, i64>(2), 1);
}
