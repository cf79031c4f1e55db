//! Canonical Hasher
//!
//! Deterministic serialization and SHA-256 digests of structured payloads.
//! Two semantically identical mappings (same keys and values, any original
//! ordering) always produce the same digest; the digest is what gets signed
//! and what gets stored.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::error::LedgerError;

/// Maximum nesting depth accepted by the canonical serializer. Inputs deeper
/// than this are refused rather than risking stack exhaustion.
const MAX_DEPTH: usize = 128;

/// Serialize a JSON value canonically: object keys sorted lexicographically,
/// no insignificant whitespace, UTF-8 output.
pub fn canonical_json(value: &Value) -> Result<String, LedgerError> {
    let mut out = String::new();
    write_canonical(value, &mut out, 0)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String, depth: usize) -> Result<(), LedgerError> {
    if depth > MAX_DEPTH {
        return Err(LedgerError::encoding(format!(
            "Payload nesting exceeds maximum depth of {}",
            MAX_DEPTH
        )));
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json renders numbers with a shortest-roundtrip algorithm, so
        // the textual form is stable for a given value. Non-finite floats
        // cannot be represented in a Value at all.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            let escaped = serde_json::to_string(s)?;
            out.push_str(&escaped);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out, depth + 1)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let escaped = serde_json::to_string(key)?;
                out.push_str(&escaped);
                out.push(':');
                write_canonical(&map[*key], out, depth + 1)?;
            }
            out.push('}');
        }
    }

    Ok(())
}

/// Compute the canonical SHA-256 hash of a JSON value.
///
/// Returns a `sha256:<64 hex chars>` string.
pub fn canonical_hash(value: &Value) -> Result<String, LedgerError> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("sha256:{}", hex::encode(digest)))
}

/// SHA-512 variant used by signing ceremonies that specify it.
pub fn canonical_hash_sha512(value: &Value) -> Result<String, LedgerError> {
    let canonical = canonical_json(value)?;
    let digest = Sha512::digest(canonical.as_bytes());
    Ok(format!("sha512:{}", hex::encode(digest)))
}

/// Convert any serializable payload into a JSON value suitable for canonical
/// hashing. Serializer failures (non-string map keys, custom serializer
/// errors) surface as `EncodingError` before anything touches the store.
/// Non-finite floats are guarded at the ledger boundary, where they can
/// actually enter.
pub fn to_canonical_value<T: Serialize>(payload: &T) -> Result<Value, LedgerError> {
    serde_json::to_value(payload)
        .map_err(|e| LedgerError::encoding(format!("Payload is not canonically serializable: {}", e)))
}

/// Strip the algorithm prefix from a rendered hash and return the raw digest
/// bytes, for feeding into signature verification.
pub fn digest_bytes(rendered_hash: &str) -> Result<Vec<u8>, LedgerError> {
    let hex_part = rendered_hash
        .split_once(':')
        .map(|(_, h)| h)
        .unwrap_or(rendered_hash);
    hex::decode(hex_part)
        .map_err(|e| LedgerError::encoding(format!("Invalid hash encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_insignificant() {
        let a = json!({"b": 1, "a": {"y": true, "x": [1, 2, 3]}});
        let b = json!({"a": {"x": [1, 2, 3], "y": true}, "b": 1});

        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_value_change_changes_hash() {
        let a = json!({"action": "SET_STATUS", "value": 1});
        let b = json!({"action": "SET_STATUS", "value": 2});

        assert_ne!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_canonical_form_has_no_whitespace_and_sorted_keys() {
        let v = json!({"zeta": "z", "alpha": [1, {"b": null, "a": false}]});
        let canonical = canonical_json(&v).unwrap();

        assert_eq!(canonical, r#"{"alpha":[1,{"a":false,"b":null}],"zeta":"z"}"#);
    }

    #[test]
    fn test_hash_format() {
        let hash = canonical_hash(&json!({})).unwrap();
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 71); // "sha256:" + 64 hex chars
    }

    #[test]
    fn test_depth_limit_rejected() {
        let mut v = json!(1);
        for _ in 0..200 {
            v = json!([v]);
        }

        let result = canonical_hash(&v);
        assert!(matches!(result, Err(LedgerError::EncodingError(_))));
    }

    #[test]
    fn test_serializable_payload_to_value() {
        #[derive(serde::Serialize)]
        struct Payload {
            count: u32,
            action: &'static str,
        }

        let v = to_canonical_value(&Payload {
            count: 2,
            action: "SET_STATUS",
        })
        .unwrap();
        assert_eq!(
            canonical_json(&v).unwrap(),
            r#"{"action":"SET_STATUS","count":2}"#
        );
    }

    #[test]
    fn test_sha512_variant() {
        let hash = canonical_hash_sha512(&json!({"k": "v"})).unwrap();
        assert!(hash.starts_with("sha512:"));
        assert_eq!(hash.len(), 7 + 128);
    }

    #[test]
    fn test_digest_bytes_roundtrip() {
        let hash = canonical_hash(&json!({"k": "v"})).unwrap();
        let bytes = digest_bytes(&hash).unwrap();
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_string_escaping() {
        let v = json!({"msg": "line1\nline2 \"quoted\""});
        let canonical = canonical_json(&v).unwrap();
        assert_eq!(canonical, r#"{"msg":"line1\nline2 \"quoted\""}"#);
    }
}
