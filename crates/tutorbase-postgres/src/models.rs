use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tutorbase_domain::{EnrichedRecord, Payload};

/// Row models bridging enriched records and table columns. Conversions
/// tolerate the same lexical shapes the validators accept (numbers and
/// booleans arriving as strings), since the source payload is stored as
/// submitted.

fn text(payload: &Payload, field: &str) -> Result<String> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("missing text field '{}'", field))
}

fn number(payload: &Payload, field: &str) -> Result<f64> {
    let value = payload
        .get(field)
        .ok_or_else(|| anyhow!("missing numeric field '{}'", field))?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow!("field '{}' is not a finite number", field)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| anyhow!("field '{}' is not numeric", field)),
        _ => Err(anyhow!("field '{}' is not numeric", field)),
    }
}

fn flag(payload: &Payload, field: &str) -> Result<bool> {
    let value = payload
        .get(field)
        .ok_or_else(|| anyhow!("missing boolean field '{}'", field))?;
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.trim() == "true" => Ok(true),
        Value::String(s) if s.trim() == "false" => Ok(false),
        _ => Err(anyhow!("field '{}' is not boolean", field)),
    }
}

fn timestamp(payload: &Payload, field: &str) -> Result<DateTime<Utc>> {
    let raw = text(payload, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| anyhow!("field '{}' is not an RFC 3339 timestamp", field))
}

fn jsonb(payload: &Payload) -> Value {
    Value::Object(payload.clone())
}

#[derive(Debug)]
pub struct TutorRow {
    pub tutor_id: String,
    pub full_name: String,
    pub email: String,
    pub hourly_rate: f64,
    pub rate_band: String,
    pub experience_level: String,
    pub source: Value,
    pub derived: Value,
}

impl TryFrom<&EnrichedRecord> for TutorRow {
    type Error = anyhow::Error;

    fn try_from(record: &EnrichedRecord) -> Result<Self> {
        Ok(Self {
            tutor_id: text(&record.source, "tutor_id")?,
            full_name: text(&record.source, "full_name")?,
            email: text(&record.source, "email")?,
            hourly_rate: number(&record.source, "hourly_rate")?,
            rate_band: text(&record.derived, "rate_band")?,
            experience_level: text(&record.derived, "experience_level")?,
            source: jsonb(&record.source),
            derived: jsonb(&record.derived),
        })
    }
}

#[derive(Debug)]
pub struct SessionRow {
    pub session_id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub attended: bool,
    pub source: Value,
    pub derived: Value,
}

impl TryFrom<&EnrichedRecord> for SessionRow {
    type Error = anyhow::Error;

    fn try_from(record: &EnrichedRecord) -> Result<Self> {
        Ok(Self {
            session_id: text(&record.source, "session_id")?,
            tutor_id: text(&record.source, "tutor_id")?,
            student_id: text(&record.source, "student_id")?,
            scheduled_start: timestamp(&record.source, "scheduled_start")?,
            attended: flag(&record.derived, "attended")?,
            source: jsonb(&record.source),
            derived: jsonb(&record.derived),
        })
    }
}

#[derive(Debug)]
pub struct FeedbackRow {
    pub session_id: String,
    pub feedback_id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub overall_rating: i32,
    pub is_detractor: bool,
    pub source: Value,
    pub derived: Value,
}

impl TryFrom<&EnrichedRecord> for FeedbackRow {
    type Error = anyhow::Error;

    fn try_from(record: &EnrichedRecord) -> Result<Self> {
        Ok(Self {
            session_id: text(&record.source, "session_id")?,
            feedback_id: text(&record.source, "feedback_id")?,
            tutor_id: text(&record.source, "tutor_id")?,
            student_id: text(&record.source, "student_id")?,
            overall_rating: number(&record.source, "overall_rating")? as i32,
            is_detractor: flag(&record.derived, "is_detractor")?,
            source: jsonb(&record.source),
            derived: jsonb(&record.derived),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tutorbase_domain::RecordKind;

    #[test]
    fn test_tutor_row_from_record() {
        let mut source = Payload::new();
        source.insert("tutor_id".to_string(), json!("tutor-1"));
        source.insert("full_name".to_string(), json!("Grace Hopper"));
        source.insert("email".to_string(), json!("grace@example.com"));
        source.insert("hourly_rate".to_string(), json!("45"));
        let mut derived = Payload::new();
        derived.insert("rate_band".to_string(), json!("standard"));
        derived.insert("experience_level".to_string(), json!("senior"));
        let record = EnrichedRecord::new(RecordKind::Tutor, source, derived).unwrap();

        let row = TutorRow::try_from(&record).unwrap();
        assert_eq!(row.tutor_id, "tutor-1");
        assert_eq!(row.hourly_rate, 45.0, "numeric strings coerce");
        assert_eq!(row.rate_band, "standard");
    }

    #[test]
    fn test_missing_derived_field_fails_conversion() {
        let mut source = Payload::new();
        source.insert("tutor_id".to_string(), json!("tutor-1"));
        source.insert("full_name".to_string(), json!("Grace Hopper"));
        source.insert("email".to_string(), json!("grace@example.com"));
        source.insert("hourly_rate".to_string(), json!(45.0));
        let record = EnrichedRecord::new(RecordKind::Tutor, source, Payload::new()).unwrap();

        let err = TutorRow::try_from(&record).unwrap_err();
        assert!(err.to_string().contains("rate_band"));
    }
}
