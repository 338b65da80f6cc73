//! Key file persistence.
//!
//! Keyrings are stored as a single JSON file mapping tenant ids to their
//! active keypair and retired public keys. Seeds are base64; the file is
//! written atomically so a crash never leaves a truncated keyring.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use sigchain_core::{Ed25519PublicKey, KeyId, Keypair};

use crate::error::{Result, StoreError};

/// One stored keypair entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKey {
    pub key_id: KeyId,
    /// Base64 public key.
    pub public_key: String,
    /// Base64 seed. Absent for retired keys, where only verification is
    /// needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

impl StoredKey {
    /// Capture a full keypair, including its seed.
    pub fn from_keypair(keypair: &Keypair, created_at: i64) -> Self {
        Self {
            key_id: keypair.key_id(),
            public_key: keypair.public_key().to_base64(),
            private_key: Some(keypair.seed_base64()),
            created_at,
        }
    }

    /// Capture only the public half.
    pub fn public_only(key: &Ed25519PublicKey, created_at: i64) -> Self {
        Self {
            key_id: key.key_id(),
            public_key: key.to_base64(),
            private_key: None,
            created_at,
        }
    }

    pub fn public_key(&self) -> Result<Ed25519PublicKey> {
        Ed25519PublicKey::from_base64(&self.public_key).map_err(|e| StoreError::Keyring {
            key_id: self.key_id.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn keypair(&self) -> Result<Option<Keypair>> {
        self.private_key
            .as_deref()
            .map(|seed| {
                Keypair::from_base64(seed).map_err(|e| StoreError::Keyring {
                    key_id: self.key_id.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// A tenant's keys: one active signer plus retired keys kept for
/// verification of older records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantKeys {
    pub active: StoredKey,
    #[serde(default)]
    pub retired: Vec<StoredKey>,
}

/// The on-disk keyring: tenant id -> keys.
pub type KeyringFile = HashMap<String, TenantKeys>;

/// Load a keyring file. A missing file is an empty keyring.
pub fn load_keyring(path: impl AsRef<Path>) -> Result<KeyringFile> {
    match fs::read_to_string(path.as_ref()) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyringFile::new()),
        Err(e) => Err(e.into()),
    }
}

/// Persist a keyring file atomically.
pub fn save_keyring(path: impl AsRef<Path>, keyring: &KeyringFile) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(keyring)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
