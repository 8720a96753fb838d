//! Content-hash gate.
//!
//! Provider APIs return full snapshots on every poll. Without a change
//! gate, every poll would re-normalize and re-publish every record,
//! multiplying downstream analyzer and storage load. The gate computes a
//! deterministic digest per raw record so unchanged records can
//! short-circuit before normalization.
//!
//! # Canonicalization
//!
//! Providers do not guarantee key order in their JSON responses, so the
//! digest is computed over a canonicalized serialization: object keys are
//! sorted recursively and known volatile metadata keys (response
//! timestamps, etags, request ids) are stripped at every nesting level.
//! Two semantically identical payloads always hash identically; any
//! change to a semantic field changes the digest.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Provider metadata keys excluded from hashing.
///
/// These change on every API response without any semantic change to the
/// record itself.
const VOLATILE_KEYS: &[&str] = &[
    "fetched_at",
    "_fetched_at",
    "etag",
    "last_api_response",
    "request_id",
];

/// Errors from content-hash computation.
///
/// Hash failures are per-record and non-fatal: the offending record is
/// dropped with a data-quality log and the rest of the batch proceeds.
#[derive(Error, Debug, Clone)]
pub enum HashError {
    /// The payload contains a value that has no canonical serialization
    /// (e.g. a non-finite float).
    #[error("payload cannot be canonically hashed: {0}")]
    UnhashablePayload(String),

    /// The canonical form could not be serialized.
    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}

/// Computes the content hash of a raw provider record.
///
/// The digest is SHA-256 over the canonicalized serialization, rendered
/// as a 64-character lowercase hex string.
///
/// # Errors
///
/// Returns [`HashError::UnhashablePayload`] when the payload contains a
/// non-finite number, which serde_json cannot round-trip.
pub fn content_hash(raw: &Value) -> Result<String, HashError> {
    let canonical = canonicalize(raw)?;
    let bytes = serde_json::to_vec(&canonical)
        .map_err(|e| HashError::Serialization(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Returns whether a record should proceed to normalization.
///
/// `false` means the record is unchanged since the last successful run
/// and short-circuits out of the pipeline.
pub fn should_process(current: &str, previous: Option<&str>) -> bool {
    match previous {
        Some(prev) => prev != current,
        None => true,
    }
}

/// Produces the canonical form of a payload: keys sorted, volatile keys
/// stripped.
///
/// serde_json::Map preserves insertion order by default, so rebuilding
/// each object with sorted keys fixes the serialization byte-for-byte.
fn canonicalize(value: &Value) -> Result<Value, HashError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !VOLATILE_KEYS.contains(&k.as_str()))
                .collect();
            keys.sort();

            let mut out = serde_json::Map::with_capacity(keys.len());
            for key in keys {
                // Key presence is guaranteed by the iteration above.
                if let Some(v) = map.get(key) {
                    out.insert(key.clone(), canonicalize(v)?);
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(canonicalize(item)?);
            }
            Ok(Value::Array(out))
        }
        Value::Number(n) => {
            if n.as_f64().is_some_and(|f| !f.is_finite()) {
                return Err(HashError::UnhashablePayload(
                    "non-finite number in payload".to_string(),
                ));
            }
            Ok(value.clone())
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        let record = json!({"id": "dev-1", "hostname": "WS-001", "online": true});
        assert_eq!(content_hash(&record).unwrap(), content_hash(&record).unwrap());
    }

    #[test]
    fn hash_is_key_order_insensitive() {
        // serde_json's Map preserves insertion order, so these two values
        // serialize differently without canonicalization.
        let a: Value =
            serde_json::from_str(r#"{"hostname": "WS-001", "id": "dev-1", "nested": {"x": 1, "y": 2}}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"nested": {"y": 2, "x": 1}, "id": "dev-1", "hostname": "WS-001"}"#)
                .unwrap();
        assert_ne!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn hash_is_sensitive_to_semantic_changes() {
        let a = json!({"id": "dev-1", "online": true});
        let b = json!({"id": "dev-1", "online": false});
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn volatile_keys_are_ignored() {
        let a = json!({"id": "dev-1", "fetched_at": "2026-01-01T00:00:00Z", "etag": "abc"});
        let b = json!({"id": "dev-1", "fetched_at": "2026-01-02T09:30:00Z", "etag": "xyz"});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn volatile_keys_stripped_at_depth() {
        let a = json!({"id": "dev-1", "agent": {"version": "1.2", "request_id": "r-1"}});
        let b = json!({"id": "dev-1", "agent": {"version": "1.2", "request_id": "r-2"}});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let hash = content_hash(&json!({"id": 1})).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn should_process_gates_on_equality() {
        assert!(should_process("abc", None));
        assert!(should_process("abc", Some("def")));
        assert!(!should_process("abc", Some("abc")));
    }

    #[test]
    fn array_order_still_matters() {
        // Arrays are positional data, not maps; reordering is a change.
        let a = json!({"ips": ["10.0.0.1", "10.0.0.2"]});
        let b = json!({"ips": ["10.0.0.2", "10.0.0.1"]});
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}
