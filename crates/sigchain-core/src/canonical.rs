//! Canonical JSON encoding for deterministic signing.
//!
//! The signable fields of a record are encoded as UTF-8 JSON with:
//! - Map keys sorted by bytewise comparison, at every nesting level
//! - No insignificant whitespace
//! - An absent parent signature encoded as an explicit `null`, so that
//!   "no parent" and "empty-string parent" can never collide
//!
//! The canonical encoding is critical: signatures are over these exact bytes,
//! so every implementation that signs or verifies records must produce them
//! bit-for-bit identically.

use serde_json::Value;

use crate::crypto::Ed25519Signature;
use crate::error::CoreError;

/// Encode the signable tuple of a record to canonical bytes.
///
/// The tuple is `{nonce, parent_signature, payload, subject_id, timestamp}`
/// (listed here in its sorted key order). `record_id` and `key_id` are
/// deliberately excluded: the former is allocated after signing, the latter
/// is authenticated by the signature verifying under the claimed key.
pub fn signable_bytes(
    subject_id: &str,
    payload: &Value,
    timestamp: i64,
    nonce: &str,
    parent_signature: Option<&Ed25519Signature>,
) -> Result<Vec<u8>, CoreError> {
    let parent = match parent_signature {
        Some(sig) => Value::String(sig.to_base64()),
        None => Value::Null,
    };

    let mut map = serde_json::Map::new();
    map.insert("subject_id".to_string(), Value::String(subject_id.to_string()));
    map.insert("payload".to_string(), payload.clone());
    map.insert("timestamp".to_string(), Value::Number(timestamp.into()));
    map.insert("nonce".to_string(), Value::String(nonce.to_string()));
    map.insert("parent_signature".to_string(), parent);

    canonical_json(&Value::Object(map))
}

/// Encode any JSON value canonically (sorted keys, compact separators).
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Recursively write a value, sorting object keys bytewise.
fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_scalar(buf, &Value::String((*key).clone()))?;
                buf.push(b':');
                write_value(buf, &map[*key])?;
            }
            buf.push(b'}');
            Ok(())
        }
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(buf, item)?;
            }
            buf.push(b']');
            Ok(())
        }
        scalar => write_scalar(buf, scalar),
    }
}

/// Write a scalar (null, bool, number, string) via serde_json.
///
/// serde_json's number and string formatting is already deterministic:
/// integers print exactly, floats use the shortest round-trip encoding.
fn write_scalar(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    serde_json::to_writer(&mut *buf, value)
        .map_err(|e| CoreError::Canonicalization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signable_bytes_deterministic() {
        let payload = json!({"city": "Paris", "temp": 22});
        let b1 = signable_bytes("weather", &payload, 1736870400, "n-1", None).unwrap();
        let b2 = signable_bytes("weather", &payload, 1736870400, "n-1", None).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_signable_bytes_golden() {
        let payload = json!({"city": "Paris", "temp": 22});
        let bytes = signable_bytes("weather", &payload, 1736870400, "n-1", None).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"nonce":"n-1","parent_signature":null,"payload":{"city":"Paris","temp":22},"subject_id":"weather","timestamp":1736870400}"#
        );
    }

    #[test]
    fn test_key_order_independence() {
        // Same logical payload built with different insertion orders.
        let mut a = serde_json::Map::new();
        a.insert("temp".into(), json!(22));
        a.insert("city".into(), json!("Paris"));

        let mut b = serde_json::Map::new();
        b.insert("city".into(), json!("Paris"));
        b.insert("temp".into(), json!(22));

        let ba = signable_bytes("weather", &Value::Object(a), 1, "n", None).unwrap();
        let bb = signable_bytes("weather", &Value::Object(b), 1, "n", None).unwrap();
        assert_eq!(ba, bb);
    }

    #[test]
    fn test_nested_maps_sorted() {
        let payload = json!({"outer": {"zebra": 1, "alpha": {"b": 2, "a": 1}}});
        let bytes = canonical_json(&payload).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"outer":{"alpha":{"a":1,"b":2},"zebra":1}}"#
        );
    }

    #[test]
    fn test_no_parent_distinct_from_empty_parent() {
        let sig = Ed25519Signature::from_bytes([0u8; 64]);
        let none = signable_bytes("t", &json!({}), 1, "n", None).unwrap();
        let some = signable_bytes("t", &json!({}), 1, "n", Some(&sig)).unwrap();
        assert_ne!(none, some);
        // The sentinel is a literal null, never an empty string.
        assert!(String::from_utf8(none).unwrap().contains(r#""parent_signature":null"#));
    }

    #[test]
    fn test_string_escaping() {
        let payload = json!({"msg": "line1\nline2 \"quoted\""});
        let bytes = canonical_json(&payload).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"msg":"line1\nline2 \"quoted\""}"#
        );
    }

    #[test]
    fn test_arrays_preserve_order() {
        let payload = json!({"items": [3, 1, 2]});
        let bytes = canonical_json(&payload).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"items":[3,1,2]}"#);
    }
}
