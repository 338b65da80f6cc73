//! Golden test vectors for the canonical encoding.
//!
//! Signatures are over these exact byte strings, so every implementation
//! that signs or verifies records must reproduce them bit-for-bit.

use sigchain_core::signable_bytes;

/// A golden canonical-encoding vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub subject_id: &'static str,
    /// Payload, as (non-canonical) JSON text.
    pub payload_json: &'static str,
    pub timestamp: i64,
    pub nonce: &'static str,
    /// Expected canonical signable bytes, as UTF-8.
    pub expected: &'static str,
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "simple object payload",
            subject_id: "weather",
            payload_json: r#"{"temp": 22, "city": "Paris"}"#,
            timestamp: 1736870400,
            nonce: "n-1",
            expected: r#"{"nonce":"n-1","parent_signature":null,"payload":{"city":"Paris","temp":22},"subject_id":"weather","timestamp":1736870400}"#,
        },
        GoldenVector {
            name: "nested maps sorted at every level",
            subject_id: "analyze",
            payload_json: r#"{"z": {"b": 2, "a": 1}, "a": [3, 1]}"#,
            timestamp: 0,
            nonce: "n-2",
            expected: r#"{"nonce":"n-2","parent_signature":null,"payload":{"a":[3,1],"z":{"a":1,"b":2}},"subject_id":"analyze","timestamp":0}"#,
        },
        GoldenVector {
            name: "scalar payload",
            subject_id: "count",
            payload_json: "42",
            timestamp: -1,
            nonce: "n-3",
            expected: r#"{"nonce":"n-3","parent_signature":null,"payload":42,"subject_id":"count","timestamp":-1}"#,
        },
        GoldenVector {
            name: "string escapes",
            subject_id: "log",
            payload_json: r#"{"msg": "a\"b\nc"}"#,
            timestamp: 1,
            nonce: "n-4",
            expected: r#"{"nonce":"n-4","parent_signature":null,"payload":{"msg":"a\"b\nc"},"subject_id":"log","timestamp":1}"#,
        },
    ]
}

/// Check one vector against the implementation.
pub fn check_vector(vector: &GoldenVector) {
    let payload: serde_json::Value =
        serde_json::from_str(vector.payload_json).expect("vector payload parses");
    let bytes = signable_bytes(
        vector.subject_id,
        &payload,
        vector.timestamp,
        vector.nonce,
        None,
    )
    .expect("canonical encoding succeeds");

    assert_eq!(
        String::from_utf8(bytes).expect("canonical bytes are UTF-8"),
        vector.expected,
        "vector {} diverged",
        vector.name
    );
}
