use crate::types::Payload;
use crate::validation::{RecordCheck, ValidationResult};

const MIN_HOURLY_RATE: f64 = 5.0;
const MAX_HOURLY_RATE: f64 = 500.0;
const MAX_YEARS_EXPERIENCE: f64 = 60.0;
const UNUSUAL_YEARS_EXPERIENCE: f64 = 40.0;

/// Validate a tutor profile record.
pub fn validate(payload: &Payload) -> ValidationResult {
    let mut check = RecordCheck::new(payload);

    check.require_str("tutor_id");
    check.require_str("full_name");

    if let Some(email) = check.require_str("email") {
        if !looks_like_email(&email) {
            check.error("email", "must be a valid email address");
        }
    }

    if let Some(rate) = check.require_number("hourly_rate") {
        check.check_range("hourly_rate", rate, MIN_HOURLY_RATE, MAX_HOURLY_RATE);
    }

    if let Some(years) = check.optional_number("years_experience") {
        if check.check_range("years_experience", years, 0.0, MAX_YEARS_EXPERIENCE)
            && years > UNUSUAL_YEARS_EXPERIENCE
        {
            check.warning("years_experience", "unusually high; worth a second look");
        }
    }

    if let Some(subjects) = check.optional_str("subjects") {
        if subjects.split(',').all(|s| s.trim().is_empty()) {
            check.warning("subjects", "subject list is empty");
        }
    }

    check.optional_timestamp("joined_at");
    check.optional_bool("active");

    check.finish()
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("tutor_id".to_string(), json!("tutor-1"));
        p.insert("full_name".to_string(), json!("Grace Hopper"));
        p.insert("email".to_string(), json!("grace@example.com"));
        p.insert("hourly_rate".to_string(), json!(45.0));
        p.insert("years_experience".to_string(), json!(12));
        p.insert("subjects".to_string(), json!("math,physics"));
        p
    }

    #[test]
    fn test_valid_tutor_passes() {
        let result = validate(&valid_payload());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let result = validate(&Payload::new());
        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"tutor_id"));
        assert!(fields.contains(&"full_name"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"hourly_rate"));
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut p = valid_payload();
        p.insert("email".to_string(), json!("not-an-email"));
        let result = validate(&p);
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "email");
    }

    #[test]
    fn test_hourly_rate_out_of_range() {
        let mut p = valid_payload();
        p.insert("hourly_rate".to_string(), json!(1200.0));
        assert!(!validate(&p).valid);
    }

    #[test]
    fn test_high_experience_warns_but_passes() {
        let mut p = valid_payload();
        p.insert("years_experience".to_string(), json!(45));
        let result = validate(&p);
        assert!(result.valid);
        assert_eq!(result.warnings[0].field, "years_experience");
    }

    #[test]
    fn test_empty_subject_list_warns() {
        let mut p = valid_payload();
        p.insert("subjects".to_string(), json!(" , ,"));
        let result = validate(&p);
        assert!(result.valid);
        assert_eq!(result.warnings[0].field, "subjects");
    }

    #[test]
    fn test_validation_is_deterministic() {
        let p = valid_payload();
        assert_eq!(validate(&p), validate(&p));
    }
}
