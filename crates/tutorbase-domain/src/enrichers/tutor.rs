use super::{optional_bool, optional_number, optional_str, optional_timestamp, required_number};
use crate::error::EnrichmentError;
use crate::types::Payload;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Derive tutor profile fields: pricing band, experience level, subject
/// count, and a profile-completeness flag.
pub fn enrich(payload: &Payload, _enqueued_at: DateTime<Utc>) -> Result<Payload, EnrichmentError> {
    let hourly_rate = required_number(payload, "hourly_rate")?;

    let mut derived = Payload::new();

    let rate_band = if hourly_rate < 25.0 {
        "budget"
    } else if hourly_rate < 60.0 {
        "standard"
    } else {
        "premium"
    };
    derived.insert("rate_band".to_string(), json!(rate_band));

    let experience_level = match optional_number(payload, "years_experience") {
        Some(years) if years < 3.0 => "junior",
        Some(years) if years < 8.0 => "mid",
        Some(_) => "senior",
        None => "unknown",
    };
    derived.insert("experience_level".to_string(), json!(experience_level));

    let subject_count = optional_str(payload, "subjects")
        .map(|s| s.split(',').filter(|part| !part.trim().is_empty()).count())
        .unwrap_or(0);
    derived.insert("subject_count".to_string(), json!(subject_count));

    let profile_complete = optional_number(payload, "years_experience").is_some()
        && optional_str(payload, "subjects").is_some()
        && optional_timestamp(payload, "joined_at").is_some()
        && optional_bool(payload, "active").is_some();
    derived.insert("profile_complete".to_string(), json!(profile_complete));

    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("tutor_id".to_string(), json!("tutor-1"));
        p.insert("hourly_rate".to_string(), json!(45.0));
        p.insert("years_experience".to_string(), json!(10));
        p.insert("subjects".to_string(), json!("math, physics, chemistry"));
        p.insert("joined_at".to_string(), json!("2024-06-01T00:00:00Z"));
        p.insert("active".to_string(), json!(true));
        p
    }

    #[test]
    fn test_derives_bands_and_counts() {
        let derived = enrich(&valid_payload(), Utc::now()).unwrap();
        assert_eq!(derived["rate_band"], json!("standard"));
        assert_eq!(derived["experience_level"], json!("senior"));
        assert_eq!(derived["subject_count"], json!(3));
        assert_eq!(derived["profile_complete"], json!(true));
    }

    #[test]
    fn test_sparse_profile_is_incomplete() {
        let mut p = Payload::new();
        p.insert("hourly_rate".to_string(), json!(15.0));
        let derived = enrich(&p, Utc::now()).unwrap();
        assert_eq!(derived["rate_band"], json!("budget"));
        assert_eq!(derived["experience_level"], json!("unknown"));
        assert_eq!(derived["subject_count"], json!(0));
        assert_eq!(derived["profile_complete"], json!(false));
    }

    #[test]
    fn test_missing_hourly_rate_is_contract_error() {
        let result = enrich(&Payload::new(), Utc::now());
        assert!(matches!(result, Err(EnrichmentError { field, .. }) if field == "hourly_rate"));
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let p = valid_payload();
        let at = Utc::now();
        assert_eq!(enrich(&p, at).unwrap(), enrich(&p, at).unwrap());
    }

    #[test]
    fn test_derived_fields_disjoint_from_source() {
        let p = valid_payload();
        let derived = enrich(&p, Utc::now()).unwrap();
        assert!(derived.keys().all(|k| !p.contains_key(k)));
    }
}
