//! # Sigchain
//!
//! A cryptographic trust layer for tool execution. Every tool result
//! becomes a signed, immutable record; records link into append-only
//! chains; chains persist in a git-like object store and can be re-verified
//! from disk at any time.
//!
//! ## Quick start
//!
//! ```no_run
//! use serde_json::json;
//! use sigchain::{Sigchain, SigchainConfig};
//!
//! # fn main() -> Result<(), sigchain::SigchainError> {
//! let ctx = Sigchain::open(SigchainConfig::new().chain_dir("/tmp/chain"))?;
//!
//! let record = ctx.append("weather", json!({"city": "Paris", "temp": 22}))?;
//! ctx.verify(&record)?;          // ok
//! assert!(ctx.verify(&record).is_err()); // replay rejected
//!
//! let report = ctx.verify_store()?; // full chain fsck from disk
//! assert!(report.valid);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod keys;
pub mod registry;
pub mod session;
pub mod verifier;

pub use config::{NonceBackend, SigchainConfig};
pub use context::Sigchain;
pub use error::{Result, SigchainError};
pub use keys::KeyManager;
pub use registry::{FnTool, Tool, ToolRegistry};
pub use session::Session;
pub use verifier::RecordVerifier;

pub use sigchain_core::{
    verify_chain, verify_proof, ChainError, CoreError, Ed25519PublicKey, Ed25519Signature, KeyId,
    Keypair, MerkleProof, MerkleTree, RecordBuilder, Sha256Hash, SignedRecord,
};
pub use sigchain_store::{
    ChainStatus, ChainStore, FsckReport, MemoryNonceStore, Namespace, NonceStore, SqliteNonceStore,
    StoreError,
};
