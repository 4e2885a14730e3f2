use crate::types::Payload;
use sha2::{Digest, Sha256};

/// Hex SHA-256 over the canonical JSON serialization of a payload.
///
/// serde_json's map type keeps keys sorted, so two payloads with the same
/// fields produce the same bytes regardless of insertion order.
pub fn payload_checksum(payload: &Payload) -> String {
    let bytes = serde_json::to_vec(payload).expect("payload map serializes infallibly");
    hex::encode(Sha256::digest(&bytes))
}
