//! # Sigchain Core
//!
//! Pure primitives for Sigchain: signed records, canonicalization, chain
//! verification, and Merkle partial proofs.
//!
//! This crate contains no I/O, no storage, no clocks it does not receive. It
//! is pure computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`SignedRecord`] - The atomic unit of trust: a signed tool result
//! - [`Keypair`] - Ed25519 signing key with a stable [`KeyId`]
//! - [`MerkleTree`] / [`MerkleProof`] - Partial proofs over chunked payloads
//!
//! ## Canonicalization
//!
//! Signable fields are encoded as canonical JSON (bytewise-sorted keys, no
//! insignificant whitespace). See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod record;

pub use canonical::signable_bytes;
pub use chain::{verify_chain, ChainError};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, KeyId, Keypair, Sha256Hash};
pub use error::CoreError;
pub use merkle::{verify_proof, MerkleProof, MerkleTree};
pub use record::{RecordBuilder, SignedRecord};
