//! Key management: per-tenant keyrings with rotation.
//!
//! Each tenant has one active signing keypair plus the public halves of its
//! retired keys, so records signed before a rotation keep verifying. Keys
//! from other parties can be explicitly trusted for verification only.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use sigchain_core::{Ed25519PublicKey, KeyId, Keypair};
use sigchain_store::{keyfile, StoredKey, TenantKeys};

use crate::error::{Result, SigchainError};

struct RetiredKey {
    key_id: KeyId,
    public_key: Ed25519PublicKey,
    created_at: i64,
}

struct TenantRing {
    active: Keypair,
    created_at: i64,
    /// Public halves of rotated-out keys, newest last.
    retired: Vec<RetiredKey>,
}

struct KmInner {
    tenants: HashMap<String, TenantRing>,
    /// Foreign keys explicitly trusted for verification.
    trusted: HashMap<KeyId, Ed25519PublicKey>,
}

/// Thread-safe key manager, optionally backed by a keyring file.
pub struct KeyManager {
    inner: Mutex<KmInner>,
    key_file: Option<PathBuf>,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl KeyManager {
    /// Load the keyring file if one is configured, otherwise start empty.
    pub fn open(key_file: Option<PathBuf>) -> Result<Self> {
        let mut tenants = HashMap::new();
        if let Some(path) = &key_file {
            for (tenant_id, keys) in keyfile::load_keyring(path)? {
                let active = keys
                    .active
                    .keypair()?
                    .ok_or_else(|| SigchainError::MissingSeed(tenant_id.clone()))?;
                let mut retired = Vec::with_capacity(keys.retired.len());
                for stored in &keys.retired {
                    retired.push(RetiredKey {
                        key_id: stored.key_id.clone(),
                        public_key: stored.public_key()?,
                        created_at: stored.created_at,
                    });
                }
                tenants.insert(
                    tenant_id,
                    TenantRing {
                        active,
                        created_at: keys.active.created_at,
                        retired,
                    },
                );
            }
        }

        Ok(Self {
            inner: Mutex::new(KmInner {
                tenants,
                trusted: HashMap::new(),
            }),
            key_file,
        })
    }

    /// Get the tenant's active keypair, generating one on first use.
    pub fn active(&self, tenant_id: &str) -> Result<Keypair> {
        let mut inner = self.lock()?;
        if !inner.tenants.contains_key(tenant_id) {
            let keypair = Keypair::generate();
            info!(tenant = tenant_id, key_id = %keypair.key_id(), "generated tenant keypair");
            inner.tenants.insert(
                tenant_id.to_string(),
                TenantRing {
                    active: keypair,
                    created_at: now_secs(),
                    retired: Vec::new(),
                },
            );
            self.persist(&inner)?;
        }
        Ok(inner.tenants[tenant_id].active.clone())
    }

    /// The tenant's active key id.
    pub fn key_id(&self, tenant_id: &str) -> Result<KeyId> {
        Ok(self.active(tenant_id)?.key_id())
    }

    /// Rotate the tenant's key: the active key is retired (public half
    /// kept for verification) and a fresh keypair becomes active.
    ///
    /// Returns `(old, new)` key ids.
    pub fn rotate(&self, tenant_id: &str) -> Result<(KeyId, KeyId)> {
        let mut inner = self.lock()?;
        let ring = inner
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| SigchainError::UnknownTenant(tenant_id.to_string()))?;

        let old_id = ring.active.key_id();
        ring.retired.push(RetiredKey {
            key_id: old_id.clone(),
            public_key: ring.active.public_key(),
            created_at: ring.created_at,
        });
        ring.active = Keypair::generate();
        ring.created_at = now_secs();
        let new_id = ring.active.key_id();

        info!(tenant = tenant_id, old = %old_id, new = %new_id, "rotated tenant key");
        self.persist(&inner)?;
        Ok((old_id, new_id))
    }

    /// Resolve a key id to its public key on behalf of a tenant.
    ///
    /// Checks the tenant's active key, then its retired keys, then the
    /// explicitly trusted foreign keys. Unresolvable ids return `None`;
    /// other tenants' keys are never consulted implicitly.
    pub fn resolve(&self, tenant_id: &str, key_id: &KeyId) -> Option<Ed25519PublicKey> {
        let inner = self.inner.lock().ok()?;

        if let Some(ring) = inner.tenants.get(tenant_id) {
            if ring.active.key_id() == *key_id {
                return Some(ring.active.public_key());
            }
            if let Some(entry) = ring.retired.iter().find(|entry| entry.key_id == *key_id) {
                return Some(entry.public_key);
            }
        }

        inner.trusted.get(key_id).copied()
    }

    /// Trust a foreign public key for verification.
    pub fn trust(&self, public_key: Ed25519PublicKey) -> Result<KeyId> {
        let key_id = public_key.key_id();
        let mut inner = self.lock()?;
        inner.trusted.insert(key_id.clone(), public_key);
        Ok(key_id)
    }

    /// Export a tenant's active public key as `(key_id, base64)`.
    pub fn export_public(&self, tenant_id: &str) -> Result<(KeyId, String)> {
        let keypair = self.active(tenant_id)?;
        Ok((keypair.key_id(), keypair.public_key().to_base64()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, KmInner>> {
        self.inner
            .lock()
            .map_err(|_| SigchainError::Store(sigchain_store::StoreError::LockPoisoned))
    }

    fn persist(&self, inner: &KmInner) -> Result<()> {
        let Some(path) = &self.key_file else {
            return Ok(());
        };

        let mut keyring = keyfile::KeyringFile::new();
        for (tenant_id, ring) in &inner.tenants {
            keyring.insert(
                tenant_id.clone(),
                TenantKeys {
                    active: StoredKey::from_keypair(&ring.active, ring.created_at),
                    retired: ring
                        .retired
                        .iter()
                        .map(|entry| StoredKey::public_only(&entry.public_key, entry.created_at))
                        .collect(),
                },
            );
        }
        keyfile::save_keyring(path, &keyring)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_is_stable_until_rotation() {
        let km = KeyManager::open(None).unwrap();
        let a = km.key_id("default").unwrap();
        let b = km.key_id("default").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rotation_keeps_old_key_verifiable() {
        let km = KeyManager::open(None).unwrap();
        let old_pk = km.active("default").unwrap().public_key();
        let (old_id, new_id) = km.rotate("default").unwrap();

        assert_ne!(old_id, new_id);
        assert_eq!(km.key_id("default").unwrap(), new_id);
        assert_eq!(km.resolve("default", &old_id), Some(old_pk));
    }

    #[test]
    fn test_tenants_are_isolated() {
        let km = KeyManager::open(None).unwrap();
        let a = km.key_id("tenant-a").unwrap();
        assert_eq!(km.resolve("tenant-b", &a), None);
    }

    #[test]
    fn test_trusted_foreign_key_resolves() {
        let km = KeyManager::open(None).unwrap();
        let foreign = Keypair::generate();
        assert_eq!(km.resolve("default", &foreign.key_id()), None);

        let key_id = km.trust(foreign.public_key()).unwrap();
        assert_eq!(km.resolve("default", &key_id), Some(foreign.public_key()));
    }

    #[test]
    fn test_retired_created_at_survives_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let km = KeyManager::open(Some(path.clone())).unwrap();
        km.active("default").unwrap();
        let original_created_at =
            keyfile::load_keyring(&path).unwrap()["default"].active.created_at;

        km.rotate("default").unwrap();
        let saved = keyfile::load_keyring(&path).unwrap();
        assert_eq!(saved["default"].retired[0].created_at, original_created_at);

        // The timestamp also survives a reload-then-rotate cycle.
        drop(km);
        let km = KeyManager::open(Some(path.clone())).unwrap();
        km.rotate("default").unwrap();
        let saved = keyfile::load_keyring(&path).unwrap();
        assert_eq!(saved["default"].retired[0].created_at, original_created_at);
    }

    #[test]
    fn test_keyring_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let (active_id, retired_id) = {
            let km = KeyManager::open(Some(path.clone())).unwrap();
            km.active("default").unwrap();
            let (old, new) = km.rotate("default").unwrap();
            (new, old)
        };

        let km = KeyManager::open(Some(path)).unwrap();
        assert_eq!(km.key_id("default").unwrap(), active_id);
        assert!(km.resolve("default", &retired_id).is_some());
    }
}
