//! # Sigchain Store
//!
//! Durable storage for Sigchain:
//!
//! - [`ChainStore`] - git-like append-only directory of signed records with
//!   per-namespace head pointers
//! - [`NonceStore`] - atomic single-use nonce reservation, with in-memory
//!   and SQLite backends
//! - [`keyfile`] - keyring persistence for tenants' signing keys
//!
//! Everything here is synchronous and thread-safe via internal locking.

pub mod chain_store;
pub mod error;
pub mod keyfile;
pub mod nonce;

pub use chain_store::{ChainStatus, ChainStore, FsckError, FsckReport, Namespace};
pub use error::{Result, StoreError};
pub use keyfile::{load_keyring, save_keyring, KeyringFile, StoredKey, TenantKeys};
pub use nonce::{MemoryNonceStore, NonceStore, SqliteNonceStore};
