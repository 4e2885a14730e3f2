use super::{optional_number, optional_str, required_number};
use crate::error::EnrichmentError;
use crate::types::Payload;
use chrono::{DateTime, Utc};
use serde_json::json;

/// The fixed set of sibling rating fields aggregated alongside the overall
/// rating.
const SIBLING_RATINGS: &[&str] = &["clarity_rating", "helpfulness_rating", "punctuality_rating"];

/// Derive feedback aggregates: average and spread over the rating fields
/// present, promoter/detractor flags, and comment stats.
pub fn enrich(payload: &Payload, _enqueued_at: DateTime<Utc>) -> Result<Payload, EnrichmentError> {
    let overall = required_number(payload, "overall_rating")?;

    let mut ratings = vec![overall];
    for field in SIBLING_RATINGS {
        if let Some(rating) = optional_number(payload, field) {
            ratings.push(rating);
        }
    }

    let sum: f64 = ratings.iter().sum();
    let avg = sum / ratings.len() as f64;
    let max = ratings.iter().cloned().fold(f64::MIN, f64::max);
    let min = ratings.iter().cloned().fold(f64::MAX, f64::min);

    let comment = optional_str(payload, "comment");

    let mut derived = Payload::new();
    derived.insert("rating_avg".to_string(), json!(avg));
    derived.insert("rating_spread".to_string(), json!(max - min));
    derived.insert("is_detractor".to_string(), json!(overall <= 2.0));
    derived.insert("is_promoter".to_string(), json!(overall >= 5.0));
    derived.insert("has_comment".to_string(), json!(comment.is_some()));
    derived.insert(
        "comment_length".to_string(),
        json!(comment.map(|c| c.chars().count()).unwrap_or(0)),
    );

    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("feedback_id".to_string(), json!("fb-1"));
        p.insert("session_id".to_string(), json!("sess-1"));
        p.insert("overall_rating".to_string(), json!(4));
        p.insert("clarity_rating".to_string(), json!(5));
        p.insert("helpfulness_rating".to_string(), json!(3));
        p.insert("comment".to_string(), json!("Solid session."));
        p
    }

    #[test]
    fn test_aggregates_over_present_ratings() {
        let derived = enrich(&valid_payload(), Utc::now()).unwrap();
        assert_eq!(derived["rating_avg"], json!(4.0));
        assert_eq!(derived["rating_spread"], json!(2.0));
        assert_eq!(derived["is_detractor"], json!(false));
        assert_eq!(derived["is_promoter"], json!(false));
        assert_eq!(derived["has_comment"], json!(true));
        assert_eq!(derived["comment_length"], json!(14));
    }

    #[test]
    fn test_overall_only() {
        let mut p = Payload::new();
        p.insert("overall_rating".to_string(), json!(5));
        let derived = enrich(&p, Utc::now()).unwrap();
        assert_eq!(derived["rating_avg"], json!(5.0));
        assert_eq!(derived["rating_spread"], json!(0.0));
        assert_eq!(derived["is_promoter"], json!(true));
        assert_eq!(derived["has_comment"], json!(false));
        assert_eq!(derived["comment_length"], json!(0));
    }

    #[test]
    fn test_detractor_flag() {
        let mut p = valid_payload();
        p.insert("overall_rating".to_string(), json!(1));
        let derived = enrich(&p, Utc::now()).unwrap();
        assert_eq!(derived["is_detractor"], json!(true));
    }

    #[test]
    fn test_missing_overall_rating_is_contract_error() {
        let result = enrich(&Payload::new(), Utc::now());
        assert!(
            matches!(result, Err(EnrichmentError { field, .. }) if field == "overall_rating")
        );
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let p = valid_payload();
        let at = Utc::now();
        assert_eq!(enrich(&p, at).unwrap(), enrich(&p, at).unwrap());
    }
}
