//! One pure enricher per record kind.
//!
//! Enrichment computes derived fields from an already-validated payload. It
//! never consults the store or the network, and anything timestamp-relative
//! is computed against the envelope's `enqueued_at`, never wall clock, so a
//! replayed message enriches to byte-identical derived fields.
//!
//! Fields validation guarantees are read through the `required_*` helpers;
//! a miss there is a producer/pipeline contract error, not a data error.

pub mod feedback;
pub mod session;
pub mod tutor;

use crate::error::EnrichmentError;
use crate::types::Payload;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub(crate) fn required_number(payload: &Payload, field: &str) -> Result<f64, EnrichmentError> {
    match payload.get(field) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| EnrichmentError::malformed(field, "expected a number")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EnrichmentError::malformed(field, "expected a number")),
        Some(_) => Err(EnrichmentError::malformed(field, "expected a number")),
        None => Err(EnrichmentError::missing(field)),
    }
}

pub(crate) fn required_timestamp(
    payload: &Payload,
    field: &str,
) -> Result<DateTime<Utc>, EnrichmentError> {
    match payload.get(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| EnrichmentError::malformed(field, "expected an RFC 3339 timestamp")),
        Some(_) => Err(EnrichmentError::malformed(field, "expected an RFC 3339 timestamp")),
        None => Err(EnrichmentError::missing(field)),
    }
}

pub(crate) fn optional_number(payload: &Payload, field: &str) -> Option<f64> {
    match payload.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn optional_timestamp(payload: &Payload, field: &str) -> Option<DateTime<Utc>> {
    match payload.get(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .ok(),
        _ => None,
    }
}

pub(crate) fn optional_str<'a>(payload: &'a Payload, field: &str) -> Option<&'a str> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    }
}

pub(crate) fn optional_bool(payload: &Payload, field: &str) -> Option<bool> {
    match payload.get(field) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
