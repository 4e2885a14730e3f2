use crate::types::Payload;
use crate::validation::{RecordCheck, ValidationResult};

const RATING_MIN: f64 = 1.0;
const RATING_MAX: f64 = 5.0;
const LOW_RATING: f64 = 2.0;
const MAX_COMMENT_CHARS: usize = 2000;

const OPTIONAL_RATINGS: &[&str] = &["clarity_rating", "helpfulness_rating", "punctuality_rating"];

/// Validate a session feedback record.
pub fn validate(payload: &Payload) -> ValidationResult {
    let mut check = RecordCheck::new(payload);

    check.require_str("feedback_id");
    check.require_str("session_id");
    check.require_str("tutor_id");
    check.require_str("student_id");

    let overall = check.require_number("overall_rating");
    if let Some(rating) = overall {
        if check.check_integer("overall_rating", rating) {
            check.check_range("overall_rating", rating, RATING_MIN, RATING_MAX);
        }
    }

    for field in OPTIONAL_RATINGS {
        if let Some(rating) = check.optional_number(field) {
            if check.check_integer(field, rating) {
                check.check_range(field, rating, RATING_MIN, RATING_MAX);
            }
        }
    }

    let comment = check.optional_str("comment");

    // Low ratings should carry free-text justification. Annotate, don't
    // reject: the rating itself is valid data.
    if let Some(rating) = overall {
        if rating <= LOW_RATING && comment.is_none() {
            check.warning("comment", "low rating without free-text justification");
        }
    }

    if let Some(text) = &comment {
        if text.chars().count() > MAX_COMMENT_CHARS {
            check.warning("comment", "comment is unusually long");
        }
    }

    check.finish()
}
