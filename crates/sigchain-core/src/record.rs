//! SignedRecord: the atomic unit of trust.
//!
//! A signed record binds a tool result to a signer, an instant, a single-use
//! nonce, and optionally the signature of a preceding record. Once created it
//! is immutable; mutating any signed field makes verification fail
//! deterministically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::canonical::signable_bytes;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, KeyId, Keypair};
use crate::error::CoreError;

/// A signed tool execution result.
///
/// Wire shape (JSON): signatures as standard base64, absent parent as `null`.
/// The signature covers `{subject_id, payload, timestamp, nonce,
/// parent_signature}` in canonical encoding; `record_id` and `key_id` are
/// outside the signed bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRecord {
    /// Identifies the action/tool that produced the payload.
    pub subject_id: String,

    /// Arbitrary structured result value.
    pub payload: Value,

    /// Ed25519 signature over the canonical signable bytes.
    pub signature: Ed25519Signature,

    /// Globally unique identifier, allocated at creation. Not signed.
    pub record_id: String,

    /// Signer-assigned creation instant (unix seconds). Signed.
    pub timestamp: i64,

    /// Single-use replay-protection value. Signed.
    pub nonce: String,

    /// Which keypair signed this record. Not itself signed; integrity relies
    /// on the signature verifying under the claimed key.
    pub key_id: KeyId,

    /// Signature of the logically preceding record, if any. Signed.
    pub parent_signature: Option<Ed25519Signature>,
}

impl SignedRecord {
    /// Recompute the canonical bytes this record's signature is over.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        signable_bytes(
            &self.subject_id,
            &self.payload,
            self.timestamp,
            &self.nonce,
            self.parent_signature.as_ref(),
        )
    }

    /// Cryptographically verify this record against the given public key.
    ///
    /// This is the integrity check only. Nonce consumption and key
    /// resolution are policy concerns layered on top.
    pub fn verify_with_key(&self, key: &Ed25519PublicKey) -> Result<(), CoreError> {
        let message = self.signable_bytes()?;
        key.verify(&message, &self.signature)
    }

    /// Serialize to the wire JSON shape.
    pub fn to_wire_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }

    /// Parse from the wire JSON shape.
    pub fn from_wire_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }
}

/// Builder for creating signed records.
///
/// The builder captures the signable tuple; `sign` canonicalizes it, signs
/// with the supplied keypair, and allocates a fresh `record_id`.
pub struct RecordBuilder {
    subject_id: String,
    payload: Value,
    timestamp: i64,
    nonce: String,
    parent_signature: Option<Ed25519Signature>,
}

impl RecordBuilder {
    /// Start building a record for the given subject and payload.
    pub fn new(subject_id: impl Into<String>, payload: Value) -> Self {
        Self {
            subject_id: subject_id.into(),
            payload,
            timestamp: 0,
            nonce: String::new(),
            parent_signature: None,
        }
    }

    /// Set the signer-assigned timestamp (unix seconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the nonce. If never called, `sign` generates a random UUID v4.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    /// Set the parent signature for chain linkage.
    pub fn parent(mut self, parent: Ed25519Signature) -> Self {
        self.parent_signature = Some(parent);
        self
    }

    /// Canonicalize, sign, and allocate a record id.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedRecord, CoreError> {
        let nonce = if self.nonce.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.nonce
        };

        let message = signable_bytes(
            &self.subject_id,
            &self.payload,
            self.timestamp,
            &nonce,
            self.parent_signature.as_ref(),
        )?;
        let signature = keypair.sign(&message);

        Ok(SignedRecord {
            subject_id: self.subject_id,
            payload: self.payload,
            signature,
            record_id: Uuid::new_v4().to_string(),
            timestamp: self.timestamp,
            nonce,
            key_id: keypair.key_id(),
            parent_signature: self.parent_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_keypair() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    #[test]
    fn test_sign_then_verify() {
        let keypair = test_keypair();
        let record = RecordBuilder::new("weather", json!({"city": "Paris", "temp": 22}))
            .timestamp(1736870400)
            .sign(&keypair)
            .unwrap();

        record.verify_with_key(&keypair.public_key()).unwrap();
        assert_eq!(record.key_id, keypair.key_id());
    }

    #[test]
    fn test_mutating_any_signed_field_breaks_verification() {
        let keypair = test_keypair();
        let parent = keypair.sign(b"previous");
        let record = RecordBuilder::new("analyze", json!({"n": 1}))
            .timestamp(1736870400)
            .parent(parent)
            .sign(&keypair)
            .unwrap();
        let pk = keypair.public_key();

        let mut tampered = record.clone();
        tampered.payload = json!({"n": 2});
        assert!(tampered.verify_with_key(&pk).is_err());

        let mut tampered = record.clone();
        tampered.timestamp += 1;
        assert!(tampered.verify_with_key(&pk).is_err());

        let mut tampered = record.clone();
        tampered.nonce = "other-nonce".to_string();
        assert!(tampered.verify_with_key(&pk).is_err());

        let mut tampered = record.clone();
        tampered.parent_signature = None;
        assert!(tampered.verify_with_key(&pk).is_err());

        let mut tampered = record.clone();
        tampered.subject_id = "other".to_string();
        assert!(tampered.verify_with_key(&pk).is_err());

        // The unsigned fields do not affect the signature.
        let mut renamed = record.clone();
        renamed.record_id = "some-other-id".to_string();
        renamed.verify_with_key(&pk).unwrap();
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair = test_keypair();
        let other = Keypair::from_seed(&[0x43; 32]);
        let record = RecordBuilder::new("t", json!(1))
            .timestamp(1)
            .sign(&keypair)
            .unwrap();

        assert!(matches!(
            record.verify_with_key(&other.public_key()),
            Err(CoreError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_wire_json_roundtrip() {
        let keypair = test_keypair();
        let parent = keypair.sign(b"previous");
        let record = RecordBuilder::new("weather", json!({"temp": 22.5}))
            .timestamp(1736870400)
            .parent(parent)
            .sign(&keypair)
            .unwrap();

        let json = record.to_wire_json().unwrap();
        let parsed = SignedRecord::from_wire_json(&json).unwrap();
        assert_eq!(record, parsed);
        parsed.verify_with_key(&keypair.public_key()).unwrap();
    }

    #[test]
    fn test_wire_shape_fields() {
        let keypair = test_keypair();
        let record = RecordBuilder::new("t", json!({}))
            .timestamp(7)
            .sign(&keypair)
            .unwrap();

        let value: Value = serde_json::from_str(&record.to_wire_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        for field in [
            "subject_id",
            "payload",
            "signature",
            "record_id",
            "timestamp",
            "nonce",
            "key_id",
            "parent_signature",
        ] {
            assert!(obj.contains_key(field), "missing wire field {field}");
        }
        assert!(obj["signature"].is_string());
        assert!(obj["parent_signature"].is_null());
    }

    #[test]
    fn test_fresh_nonce_and_record_id_per_signing() {
        let keypair = test_keypair();
        let r1 = RecordBuilder::new("t", json!(1)).timestamp(1).sign(&keypair).unwrap();
        let r2 = RecordBuilder::new("t", json!(1)).timestamp(1).sign(&keypair).unwrap();
        assert_ne!(r1.nonce, r2.nonce);
        assert_ne!(r1.record_id, r2.record_id);
        assert_ne!(r1.signature, r2.signature);
    }
}
