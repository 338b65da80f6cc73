//! Cryptographic primitives for Sigchain.
//!
//! Wraps Ed25519 signing and SHA-256 hashing with strong types.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedRecord("hash must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Stable identifier for a keypair, derived from the public key alone.
///
/// `key_id = hex(sha256(public_key))[..16]`. Anyone holding the public key
/// can recompute it, so records carry the id instead of the key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub String);

impl KeyId {
    /// Derive the key id from a public key.
    pub fn derive(public_key: &Ed25519PublicKey) -> Self {
        Self(Sha256Hash::hash(&public_key.0).to_hex()[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to standard base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parse from standard base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::MalformedKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedKey("public key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Derive the stable key id for this public key.
    pub fn key_id(&self) -> KeyId {
        KeyId::derive(self)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::SignatureMismatch)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &hex::encode(self.0)[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
///
/// Serializes as standard base64, the wire encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to standard base64 (the wire encoding).
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parse from standard base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::MalformedSignature(e.to_string()))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedSignature("signature must be 64 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &hex::encode(self.0)[..16])
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 64]> for Ed25519Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

/// A keypair for signing records.
///
/// Wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create from a base64-encoded seed.
    pub fn from_base64(encoded: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::MalformedKey(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedKey("seed must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Derive the stable key id.
    pub fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Export the seed as base64 (for key files).
    pub fn seed_base64(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        let tampered = b"hello worlD";
        assert!(keypair.public_key().verify(tampered, &signature).is_err());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.key_id(), kp2.key_id());
    }

    #[test]
    fn test_key_id_derived_from_public_key_only() {
        let keypair = Keypair::from_seed(&[0x07; 32]);
        let id1 = keypair.key_id();
        let id2 = KeyId::derive(&keypair.public_key());
        assert_eq!(id1, id2);
        assert_eq!(id1.as_str().len(), 16);
    }

    #[test]
    fn test_sha256_hash() {
        let h1 = Sha256Hash::hash(b"test data");
        let h2 = Sha256Hash::hash(b"test data");
        assert_eq!(h1, h2);

        let h3 = Sha256Hash::hash(b"different data");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let keypair = Keypair::generate();
        let pk = keypair.public_key();
        let encoded = pk.to_base64();
        let recovered = Ed25519PublicKey::from_base64(&encoded).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn test_signature_base64_roundtrip() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"payload");
        let encoded = sig.to_base64();
        let recovered = Ed25519Signature::from_base64(&encoded).unwrap();
        assert_eq!(sig, recovered);
    }

    #[test]
    fn test_signature_serde_is_base64_string() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let sig = keypair.sign(b"payload");

        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.to_base64()));

        let back: Ed25519Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn test_seed_base64_roundtrip() {
        let keypair = Keypair::generate();
        let recovered = Keypair::from_base64(&keypair.seed_base64()).unwrap();
        assert_eq!(keypair.public_key(), recovered.public_key());
    }
}
