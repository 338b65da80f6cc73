//! Error types for the storage layer.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error touching the chain directory or a key file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pointer names an object that is not on disk.
    #[error("missing object: {record_id}")]
    MissingObject { record_id: String },

    /// An object file exists but cannot be interpreted.
    #[error("corrupt object {record_id}: {reason}")]
    CorruptObject { record_id: String, reason: String },

    /// An appended record does not link to the current head.
    #[error("record {record_id} does not extend the current head")]
    ParentMismatch { record_id: String },

    /// The first record of a namespace carried a parent signature.
    #[error("record {record_id} has a parent but the chain is empty")]
    RootHasParent { record_id: String },

    /// A keyring file entry could not be interpreted.
    #[error("keyring entry for key {key_id}: {reason}")]
    Keyring { key_id: String, reason: String },

    /// Record lookup failed.
    #[error("record not found: {record_id}")]
    NotFound { record_id: String },

    /// An internal lock was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
