use super::{optional_bool, optional_timestamp, required_timestamp};
use crate::error::EnrichmentError;
use crate::types::Payload;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde_json::json;

const LATE_START_MINUTES: i64 = 5;
const STALE_AFTER_DAYS: i64 = 7;

/// Derive session timing fields: durations, time-of-day bucket, weekday,
/// attendance and lateness flags, and an ingest-staleness flag.
///
/// `stale_at_ingest` compares the envelope's `enqueued_at` against the
/// scheduled end, never the enrichment wall clock, so replays derive the
/// same value.
pub fn enrich(payload: &Payload, enqueued_at: DateTime<Utc>) -> Result<Payload, EnrichmentError> {
    let scheduled_start = required_timestamp(payload, "scheduled_start")?;
    let scheduled_end = required_timestamp(payload, "scheduled_end")?;
    let actual_start = optional_timestamp(payload, "actual_start");
    let actual_end = optional_timestamp(payload, "actual_end");
    let no_show = optional_bool(payload, "no_show").unwrap_or(false);

    let mut derived = Payload::new();

    derived.insert(
        "scheduled_duration_minutes".to_string(),
        json!((scheduled_end - scheduled_start).num_minutes()),
    );
    derived.insert(
        "time_of_day_bucket".to_string(),
        json!(time_of_day_bucket(scheduled_start.hour())),
    );
    derived.insert(
        "weekday".to_string(),
        json!(scheduled_start.weekday().to_string()),
    );
    derived.insert("attended".to_string(), json!(!no_show));

    if let Some(started) = actual_start {
        let delay = (started - scheduled_start).num_minutes();
        derived.insert("start_delay_minutes".to_string(), json!(delay));
        derived.insert("started_late".to_string(), json!(delay > LATE_START_MINUTES));
    }

    if let (Some(started), Some(ended)) = (actual_start, actual_end) {
        derived.insert(
            "actual_duration_minutes".to_string(),
            json!((ended - started).num_minutes()),
        );
        derived.insert("overran".to_string(), json!(ended > scheduled_end));
    }

    let stale = enqueued_at - scheduled_end > Duration::days(STALE_AFTER_DAYS);
    derived.insert("stale_at_ingest".to_string(), json!(stale));

    Ok(derived)
}

fn time_of_day_bucket(hour: u32) -> &'static str {
    match hour {
        0..=5 => "night",
        6..=11 => "morning",
        12..=17 => "afternoon",
        _ => "evening",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("session_id".to_string(), json!("sess-1"));
        p.insert("scheduled_start".to_string(), json!("2026-03-02T14:00:00Z"));
        p.insert("scheduled_end".to_string(), json!("2026-03-02T15:00:00Z"));
        p.insert("actual_start".to_string(), json!("2026-03-02T14:10:00Z"));
        p.insert("actual_end".to_string(), json!("2026-03-02T15:05:00Z"));
        p.insert("no_show".to_string(), json!(false));
        p
    }

    fn enqueued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_derives_timing_fields() {
        let derived = enrich(&valid_payload(), enqueued()).unwrap();
        assert_eq!(derived["scheduled_duration_minutes"], json!(60));
        assert_eq!(derived["time_of_day_bucket"], json!("afternoon"));
        assert_eq!(derived["weekday"], json!("Mon"));
        assert_eq!(derived["attended"], json!(true));
        assert_eq!(derived["start_delay_minutes"], json!(10));
        assert_eq!(derived["started_late"], json!(true));
        assert_eq!(derived["actual_duration_minutes"], json!(55));
        assert_eq!(derived["overran"], json!(true));
        assert_eq!(derived["stale_at_ingest"], json!(false));
    }

    #[test]
    fn test_no_show_omits_actual_timing() {
        let mut p = valid_payload();
        p.remove("actual_start");
        p.remove("actual_end");
        p.insert("no_show".to_string(), json!(true));
        let derived = enrich(&p, enqueued()).unwrap();
        assert_eq!(derived["attended"], json!(false));
        assert!(!derived.contains_key("start_delay_minutes"));
        assert!(!derived.contains_key("actual_duration_minutes"));
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(time_of_day_bucket(3), "night");
        assert_eq!(time_of_day_bucket(6), "morning");
        assert_eq!(time_of_day_bucket(12), "afternoon");
        assert_eq!(time_of_day_bucket(23), "evening");
    }

    #[test]
    fn test_staleness_uses_enqueued_timestamp() {
        let p = valid_payload();
        let late_ingest = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let derived = enrich(&p, late_ingest).unwrap();
        assert_eq!(derived["stale_at_ingest"], json!(true));

        // Same envelope timestamp, same answer: replayable.
        assert_eq!(enrich(&p, late_ingest).unwrap(), derived);
    }

    #[test]
    fn test_staleness_boundary_counts_partial_days() {
        let p = valid_payload();

        // Exactly seven days after scheduled_end: not yet stale.
        let at_limit = Utc.with_ymd_and_hms(2026, 3, 9, 15, 0, 0).unwrap();
        let derived = enrich(&p, at_limit).unwrap();
        assert_eq!(derived["stale_at_ingest"], json!(false));

        // Seven days and 23 hours: past the limit even though the
        // whole-day count is still seven.
        let past_limit = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let derived = enrich(&p, past_limit).unwrap();
        assert_eq!(derived["stale_at_ingest"], json!(true));
    }

    #[test]
    fn test_missing_scheduled_start_is_contract_error() {
        let mut p = valid_payload();
        p.remove("scheduled_start");
        let result = enrich(&p, enqueued());
        assert!(
            matches!(result, Err(EnrichmentError { field, .. }) if field == "scheduled_start")
        );
    }
}
