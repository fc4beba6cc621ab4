//! Helpers for constructing and hashing chunk payloads.

use crate::qdrant::types::PointInsert;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(chunk_id: &str, point: &PointInsert, indexed_at: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("chunk_id".into(), Value::String(chunk_id.to_string()));
    payload.insert("text".into(), Value::String(point.text.clone()));
    payload.insert("source".into(), Value::String(point.source.clone()));
    payload.insert("page".into(), Value::from(point.page));
    if let Some(start_index) = point.start_index {
        payload.insert("start_index".into(), Value::from(start_index));
    }
    payload.insert("chunk_hash".into(), Value::String(point.chunk_hash.clone()));
    payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted as RFC 3339.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct an identifier suitable for Qdrant points.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
