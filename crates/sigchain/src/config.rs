//! Context configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Which nonce backend to use for replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceBackend {
    /// In-process only; reservations vanish on restart.
    Memory,
    /// SQLite database at the given path.
    Sqlite(PathBuf),
}

/// Configuration for a [`Sigchain`](crate::Sigchain) context.
#[derive(Debug, Clone)]
pub struct SigchainConfig {
    /// Tenant whose keys sign records, and the nonce namespace.
    pub tenant_id: String,
    /// Whether verification consumes nonces. Signing always generates them.
    pub enable_nonce: bool,
    /// How long a consumed nonce blocks reuse.
    pub nonce_ttl: Duration,
    pub nonce_backend: NonceBackend,
    /// Root directory of the append-only chain store. `None` disables
    /// persistence; signing and verification still work.
    pub chain_dir: Option<PathBuf>,
    /// Keyring file. `None` keeps keys in memory only.
    pub key_file: Option<PathBuf>,
}

impl Default for SigchainConfig {
    fn default() -> Self {
        Self {
            tenant_id: "default".to_string(),
            enable_nonce: true,
            nonce_ttl: Duration::from_secs(300),
            nonce_backend: NonceBackend::Memory,
            chain_dir: None,
            key_file: None,
        }
    }
}

impl SigchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn chain_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chain_dir = Some(dir.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    pub fn sqlite_nonces(mut self, path: impl Into<PathBuf>) -> Self {
        self.nonce_backend = NonceBackend::Sqlite(path.into());
        self
    }

    /// Skip nonce consumption during verification. Integrity checks still
    /// run; only replay detection is disabled.
    pub fn without_nonce_check(mut self) -> Self {
        self.enable_nonce = false;
        self
    }
}
