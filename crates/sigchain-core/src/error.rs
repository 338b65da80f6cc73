//! Error types for Sigchain core primitives.

use thiserror::Error;

/// Core errors that can occur during record operations.
///
/// `SignatureMismatch` is the integrity failure; everything else is a
/// structural or encoding problem. Verification treats all of them as
/// failure, never as a bypass.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature encoding: {0}")]
    MalformedSignature(String),

    #[error("invalid key encoding: {0}")]
    MalformedKey(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("merkle tree requires at least one chunk")]
    EmptyTree,

    #[error("leaf index {index} out of range for tree of {leaves} leaves")]
    ProofOutOfRange { index: usize, leaves: usize },
}
