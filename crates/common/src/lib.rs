//! vox_common
//!
//! Canonical JSON serialization + SHA-256 hashing utilities.
//! This exists to guarantee determinism for:
//! - evidence snapshot hashing (content addressing)
//! - provenance signatures
//! - prompt hashing in the AI call audit
//!
//! IMPORTANT: Do not "pretty print". Hashes must be computed over canonical bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod ids;
pub mod sign;

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("failed to serialize json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize to canonical JSON bytes:
/// - keys sorted lexicographically at every level (enforced via Value roundtrip)
/// - no insignificant whitespace
/// - UTF-8, non-ASCII characters unescaped
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    let v = serde_json::to_value(value)?;
    let sorted = sort_json_value(v);
    Ok(serde_json::to_vec(&sorted)?)
}

/// Canonical form as a `serde_json::Value` (safe to persist as the stored payload).
pub fn canonical_value<T: Serialize>(value: &T) -> Result<serde_json::Value, CanonError> {
    Ok(sort_json_value(serde_json::to_value(value)?))
}

/// Lowercase hex SHA-256 of canonical JSON bytes.
pub fn sha256_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn sort_json_value(v: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k, sort_json_value(v));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Obj {
        b: u32,
        a: u32,
    }

    #[test]
    fn canonical_hash_is_stable_across_key_order() {
        let x = Obj { b: 2, a: 1 };
        let y = Obj { a: 1, b: 2 };
        let hx = sha256_canonical_json(&x).unwrap();
        let hy = sha256_canonical_json(&y).unwrap();
        assert_eq!(hx, hy);
    }

    #[test]
    fn canon_is_idempotent() {
        let v = json!({"z": [3, 1], "a": {"y": true, "b": "é"}});
        let once = canonical_json_bytes(&v).unwrap();
        let roundtrip: serde_json::Value = serde_json::from_slice(&once).unwrap();
        let twice = canonical_json_bytes(&roundtrip).unwrap();
        assert_eq!(once, twice);
        assert_eq!(sha256_hex(&once), sha256_hex(&twice));
    }

    #[test]
    fn canonical_bytes_have_no_whitespace_and_keep_utf8() {
        let v = json!({"msg": "région", "k": 1});
        let bytes = canonical_json_bytes(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"{"k":1,"msg":"région"}"#);
    }

    #[test]
    fn hash_is_bare_lowercase_hex() {
        let h = sha256_hex(b"voxcortex");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
