//! Standalone verification from public keys alone.
//!
//! A [`RecordVerifier`] holds only public keys, so a relying party can check
//! records and chains it receives without any signing capability, nonce
//! store, or chain directory.

use std::collections::HashMap;

use sigchain_core::{
    verify_chain, ChainError, Ed25519PublicKey, KeyId, SignedRecord,
};

use crate::error::{Result, SigchainError};

/// Verifies records against a fixed set of trusted public keys.
#[derive(Default)]
pub struct RecordVerifier {
    keys: HashMap<KeyId, Ed25519PublicKey>,
}

impl RecordVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a verifier trusting a single base64-encoded public key.
    pub fn from_public_key(encoded: &str) -> Result<Self> {
        let mut verifier = Self::new();
        verifier.add_key_base64(encoded)?;
        Ok(verifier)
    }

    /// Trust an additional public key.
    pub fn add_key(&mut self, key: Ed25519PublicKey) -> KeyId {
        let key_id = key.key_id();
        self.keys.insert(key_id.clone(), key);
        key_id
    }

    /// Trust an additional base64-encoded public key.
    pub fn add_key_base64(&mut self, encoded: &str) -> Result<KeyId> {
        Ok(self.add_key(Ed25519PublicKey::from_base64(encoded)?))
    }

    /// Verify one record's integrity: key known, signature valid.
    ///
    /// Replay protection is deliberately out of scope here; a standalone
    /// verifier has no nonce history.
    pub fn verify(&self, record: &SignedRecord) -> Result<()> {
        let key = self
            .keys
            .get(&record.key_id)
            .ok_or_else(|| SigchainError::UnknownKey {
                key_id: record.key_id.clone(),
            })?;
        record.verify_with_key(key)?;
        Ok(())
    }

    /// Verify an ordered chain, root first.
    pub fn verify_chain(&self, records: &[SignedRecord]) -> std::result::Result<(), ChainError> {
        verify_chain(records, |key_id| self.keys.get(key_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigchain_core::{Keypair, RecordBuilder};

    #[test]
    fn test_verify_from_exported_key() {
        let keypair = Keypair::generate();
        let record = RecordBuilder::new("t", json!({"ok": true}))
            .timestamp(1)
            .sign(&keypair)
            .unwrap();

        let verifier = RecordVerifier::from_public_key(&keypair.public_key().to_base64()).unwrap();
        verifier.verify(&record).unwrap();

        // A second verification succeeds too: no nonce state here.
        verifier.verify(&record).unwrap();
    }

    #[test]
    fn test_unknown_signer_rejected() {
        let keypair = Keypair::generate();
        let stranger = Keypair::generate();
        let record = RecordBuilder::new("t", json!(1))
            .timestamp(1)
            .sign(&stranger)
            .unwrap();

        let verifier = RecordVerifier::from_public_key(&keypair.public_key().to_base64()).unwrap();
        assert!(matches!(
            verifier.verify(&record),
            Err(SigchainError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_multi_key_chain() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let first = RecordBuilder::new("a", json!(1)).timestamp(1).sign(&alice).unwrap();
        let second = RecordBuilder::new("b", json!(2))
            .timestamp(2)
            .parent(first.signature)
            .sign(&bob)
            .unwrap();

        let mut verifier = RecordVerifier::new();
        verifier.add_key(alice.public_key());
        verifier.add_key(bob.public_key());
        verifier.verify_chain(&[first, second]).unwrap();
    }
}
