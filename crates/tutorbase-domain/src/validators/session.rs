use crate::types::Payload;
use crate::validation::{RecordCheck, ValidationResult};

const DELIVERY_MODES: &[&str] = &["online", "in_person", "hybrid"];
const MAX_PRICE: f64 = 1000.0;
const LONG_SESSION_MINUTES: i64 = 240;

/// Validate a tutoring session record.
pub fn validate(payload: &Payload) -> ValidationResult {
    let mut check = RecordCheck::new(payload);

    check.require_str("session_id");
    check.require_str("tutor_id");
    check.require_str("student_id");

    let scheduled_start = check.require_timestamp("scheduled_start");
    let scheduled_end = check.require_timestamp("scheduled_end");
    let actual_start = check.optional_timestamp("actual_start");
    let actual_end = check.optional_timestamp("actual_end");
    let no_show = check.optional_bool("no_show").unwrap_or(false);

    if let (Some(start), Some(end)) = (scheduled_start, scheduled_end) {
        if end <= start {
            check.error("scheduled_end", "must be after scheduled_start");
        } else if (end - start).num_minutes() > LONG_SESSION_MINUTES {
            check.warning("scheduled_end", "scheduled duration exceeds four hours");
        }
    }

    // A session nobody attended cannot have started.
    if no_show && actual_start.is_some() {
        check.error("actual_start", "a no-show session must not carry an actual start");
    }

    if actual_end.is_some() && actual_start.is_none() {
        check.error("actual_end", "present without actual_start");
    }

    if let (Some(start), Some(end)) = (actual_start, actual_end) {
        if end <= start {
            check.error("actual_end", "must be after actual_start");
        }
    }

    if let Some(mode) = check.optional_str("delivery_mode") {
        check.check_one_of("delivery_mode", &mode, DELIVERY_MODES);
    }

    if let Some(price) = check.optional_number("price") {
        check.check_range("price", price, 0.0, MAX_PRICE);
    }

    check.finish()
}
