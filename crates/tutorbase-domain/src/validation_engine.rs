use crate::types::{Payload, RecordKind};
use crate::validation::ValidationResult;
use crate::validators;
use tracing::debug;

/// Routes a payload to the validator for its kind.
///
/// Dispatch is an exhaustive match over [`RecordKind`], so an unhandled kind
/// is a compile error rather than a runtime lookup miss. The engine itself
/// is stateless; counters live in the worker's injected stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, kind: RecordKind, payload: &Payload) -> ValidationResult {
        let result = match kind {
            RecordKind::Tutor => validators::tutor::validate(payload),
            RecordKind::Session => validators::session::validate(payload),
            RecordKind::Feedback => validators::feedback::validate(payload),
        };

        debug!(
            kind = %kind,
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validated record"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatches_by_kind() {
        let engine = ValidationEngine::new();

        let mut tutor = Payload::new();
        tutor.insert("tutor_id".to_string(), json!("tutor-1"));
        let result = engine.validate(RecordKind::Tutor, &tutor);
        // Tutor validator complains about tutor fields, not session fields.
        assert!(result.errors.iter().any(|e| e.field == "email"));
        assert!(result.errors.iter().all(|e| e.field != "session_id"));

        let result = engine.validate(RecordKind::Session, &Payload::new());
        assert!(result.errors.iter().any(|e| e.field == "session_id"));
    }

    #[test]
    fn test_repeated_validation_is_identical() {
        let engine = ValidationEngine::new();
        let mut payload = Payload::new();
        payload.insert("overall_rating".to_string(), json!(9));
        assert_eq!(
            engine.validate(RecordKind::Feedback, &payload),
            engine.validate(RecordKind::Feedback, &payload)
        );
    }
}
