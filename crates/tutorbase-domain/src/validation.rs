use crate::types::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field-level finding. The same shape is used for errors (reject
/// the record) and warnings (annotate and pass through).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub value: Option<Value>,
}

/// Outcome of validating one payload. Any error forces `valid == false`;
/// warnings never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Field-level check utility shared by all validators: reads typed values
/// out of the flat payload, coercing where the upstream producers are known
/// to be sloppy (numbers and bools arriving as strings), and accumulates
/// issues in encounter order.
pub struct RecordCheck<'a> {
    payload: &'a Payload,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl<'a> RecordCheck<'a> {
    pub fn new(payload: &'a Payload) -> Self {
        Self {
            payload,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
            value: self.payload.get(field).cloned(),
        });
    }

    pub fn warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
            value: self.payload.get(field).cloned(),
        });
    }

    /// Non-empty string, required. Records an error when absent or blank.
    pub fn require_str(&mut self, field: &str) -> Option<String> {
        match self.read_str(field) {
            Ok(Some(s)) => Some(s),
            Ok(None) => {
                self.error(field, "required field is missing");
                None
            }
            Err(()) => None,
        }
    }

    pub fn optional_str(&mut self, field: &str) -> Option<String> {
        self.read_str(field).ok().flatten()
    }

    /// Number, required. Accepts a JSON number or a numeric string.
    pub fn require_number(&mut self, field: &str) -> Option<f64> {
        match self.read_number(field) {
            Ok(Some(n)) => Some(n),
            Ok(None) => {
                self.error(field, "required field is missing");
                None
            }
            Err(()) => None,
        }
    }

    pub fn optional_number(&mut self, field: &str) -> Option<f64> {
        self.read_number(field).ok().flatten()
    }

    /// RFC 3339 timestamp, required.
    pub fn require_timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        match self.read_timestamp(field) {
            Ok(Some(ts)) => Some(ts),
            Ok(None) => {
                self.error(field, "required field is missing");
                None
            }
            Err(()) => None,
        }
    }

    pub fn optional_timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        self.read_timestamp(field).ok().flatten()
    }

    /// Bool, optional. Accepts a JSON bool or "true"/"false" strings.
    pub fn optional_bool(&mut self, field: &str) -> Option<bool> {
        match self.payload.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => {
                    self.error(field, "expected a boolean");
                    None
                }
            },
            Some(_) => {
                self.error(field, "expected a boolean");
                None
            }
        }
    }

    /// Inclusive numeric range check; records an error when out of range.
    pub fn check_range(&mut self, field: &str, value: f64, min: f64, max: f64) -> bool {
        if value < min || value > max {
            self.error(field, &format!("must be between {} and {}", min, max));
            false
        } else {
            true
        }
    }

    /// Enumerated-value membership; records an error on unknown values.
    pub fn check_one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> bool {
        if allowed.contains(&value) {
            true
        } else {
            self.error(
                field,
                &format!("must be one of: {}", allowed.join(", ")),
            );
            false
        }
    }

    /// Whole number check for rating-style fields.
    pub fn check_integer(&mut self, field: &str, value: f64) -> bool {
        if value.fract() != 0.0 {
            self.error(field, "must be a whole number");
            false
        } else {
            true
        }
    }

    pub fn finish(self) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn read_str(&mut self, field: &str) -> Result<Option<String>, ()> {
        match self.payload.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(_) => {
                self.error(field, "expected a string");
                Err(())
            }
        }
    }

    fn read_number(&mut self, field: &str) -> Result<Option<f64>, ()> {
        match self.payload.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) => Ok(Some(f)),
                None => {
                    self.error(field, "expected a number");
                    Err(())
                }
            },
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Ok(Some(f)),
                Err(_) => {
                    self.error(field, "expected a number");
                    Err(())
                }
            },
            Some(_) => {
                self.error(field, "expected a number");
                Err(())
            }
        }
    }

    fn read_timestamp(&mut self, field: &str) -> Result<Option<DateTime<Utc>>, ()> {
        match self.payload.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
                Err(_) => {
                    self.error(field, "expected an RFC 3339 timestamp");
                    Err(())
                }
            },
            Some(_) => {
                self.error(field, "expected an RFC 3339 timestamp");
                Err(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_require_str_missing_records_error() {
        let p = payload(&[]);
        let mut check = RecordCheck::new(&p);
        assert!(check.require_str("tutor_id").is_none());
        let result = check.finish();
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "tutor_id");
        assert_eq!(result.errors[0].value, None);
    }

    #[test]
    fn test_blank_string_counts_as_missing() {
        let p = payload(&[("tutor_id", json!("   "))]);
        let mut check = RecordCheck::new(&p);
        assert!(check.require_str("tutor_id").is_none());
        assert!(!check.finish().valid);
    }

    #[test]
    fn test_number_coerces_from_string() {
        let p = payload(&[("hourly_rate", json!("42.5"))]);
        let mut check = RecordCheck::new(&p);
        assert_eq!(check.require_number("hourly_rate"), Some(42.5));
        assert!(check.finish().valid);
    }

    #[test]
    fn test_non_numeric_string_is_error() {
        let p = payload(&[("hourly_rate", json!("a lot"))]);
        let mut check = RecordCheck::new(&p);
        assert!(check.require_number("hourly_rate").is_none());
        let result = check.finish();
        assert!(!result.valid);
        assert_eq!(result.errors[0].value, Some(json!("a lot")));
    }

    #[test]
    fn test_timestamp_parsing() {
        let p = payload(&[("scheduled_start", json!("2026-03-01T14:30:00Z"))]);
        let mut check = RecordCheck::new(&p);
        let ts = check.require_timestamp("scheduled_start").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-01T14:30:00+00:00");
    }

    #[test]
    fn test_bool_coerces_from_string() {
        let p = payload(&[("no_show", json!("TRUE"))]);
        let mut check = RecordCheck::new(&p);
        assert_eq!(check.optional_bool("no_show"), Some(true));
        assert!(check.finish().valid);
    }

    #[test]
    fn test_range_and_membership() {
        let p = payload(&[("overall_rating", json!(7)), ("delivery_mode", json!("carrier_pigeon"))]);
        let mut check = RecordCheck::new(&p);
        assert!(!check.check_range("overall_rating", 7.0, 1.0, 5.0));
        assert!(!check.check_one_of("delivery_mode", "carrier_pigeon", &["online", "in_person"]));
        let result = check.finish();
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let p = payload(&[("comment", json!(""))]);
        let mut check = RecordCheck::new(&p);
        check.warning("comment", "low rating without justification");
        let result = check.finish();
        assert!(result.valid);
        assert!(result.has_warnings());
    }
}
