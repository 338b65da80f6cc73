//! Top-level error type.

use thiserror::Error;

use sigchain_core::{ChainError, CoreError, KeyId};
use sigchain_store::StoreError;

/// Errors surfaced by the [`Sigchain`](crate::Sigchain) context.
#[derive(Debug, Error)]
pub enum SigchainError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record verified cryptographically but its nonce was already
    /// consumed.
    #[error("nonce already used: {nonce}")]
    NonceReplay { nonce: String },

    /// The record claims a key this context cannot resolve.
    #[error("unknown key: {key_id}")]
    UnknownKey { key_id: KeyId },

    /// No tenant with this id in the keyring.
    #[error("unknown tenant: {0}")]
    UnknownTenant(String),

    /// No tool registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A registered tool returned an error.
    #[error("tool {name} failed: {message}")]
    ToolFailed { name: String, message: String },

    /// A chain operation was requested but no chain directory is configured.
    #[error("chain store not configured")]
    ChainDisabled,

    /// A keyring entry holds only a public key where a signer is required.
    #[error("keyring for tenant {0} has no private key")]
    MissingSeed(String),
}

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, SigchainError>;
