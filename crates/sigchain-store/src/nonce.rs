//! Nonce stores: atomic single-use reservation for replay protection.
//!
//! A nonce may be reserved at most once per namespace within its TTL. The
//! reservation is the security primitive: check and insert happen in one
//! atomic step, so two concurrent verifications of the same record cannot
//! both succeed.
//!
//! Two backends: [`MemoryNonceStore`] for single-process use and tests, and
//! [`SqliteNonceStore`] for durability across restarts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

/// Replay-protection backend.
///
/// Implementations must make `reserve` atomic: of any number of concurrent
/// calls with the same `(namespace, nonce)`, exactly one returns `true`.
pub trait NonceStore: Send + Sync {
    /// Try to reserve a nonce. Returns `true` if this call claimed it,
    /// `false` if it was already reserved and has not expired.
    ///
    /// Reserving an expired nonce succeeds and starts a fresh TTL window.
    fn reserve(&self, namespace: &str, nonce: &str, ttl: Duration) -> Result<bool>;

    /// Remove expired reservations. Returns how many were dropped.
    fn purge_expired(&self) -> Result<usize>;
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}

/// In-memory nonce store.
///
/// Reservations live in a mutex-guarded map keyed by `(namespace, nonce)`;
/// the mutex makes the check-and-insert atomic.
#[derive(Default)]
pub struct MemoryNonceStore {
    /// (namespace, nonce) -> expiry instant (unix seconds).
    seen: Mutex<HashMap<(String, String), i64>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NonceStore for MemoryNonceStore {
    fn reserve(&self, namespace: &str, nonce: &str, ttl: Duration) -> Result<bool> {
        let now = now_secs();
        let expires_at = now + ttl.as_secs() as i64;
        let key = (namespace.to_string(), nonce.to_string());

        let mut seen = self.seen.lock().map_err(|_| StoreError::LockPoisoned)?;
        match seen.get(&key) {
            Some(&expiry) if expiry > now => Ok(false),
            _ => {
                seen.insert(key, expires_at);
                Ok(true)
            }
        }
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = now_secs();
        let mut seen = self.seen.lock().map_err(|_| StoreError::LockPoisoned)?;
        let before = seen.len();
        seen.retain(|_, &mut expiry| expiry > now);
        Ok(before - seen.len())
    }
}

/// SQLite-backed nonce store.
///
/// The reservation is a single upsert that only overwrites expired rows, so
/// atomicity comes from SQLite rather than from application locking.
pub struct SqliteNonceStore {
    conn: Mutex<Connection>,
}

const NONCE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nonces (
    namespace     TEXT NOT NULL,
    nonce         TEXT NOT NULL,
    first_seen_at INTEGER NOT NULL,
    expires_at    INTEGER NOT NULL,
    PRIMARY KEY (namespace, nonce)
);
CREATE INDEX IF NOT EXISTS idx_nonces_expiry ON nonces (expires_at);
";

impl SqliteNonceStore {
    /// Open a nonce database at the given path, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(NONCE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory nonce database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(NONCE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl NonceStore for SqliteNonceStore {
    fn reserve(&self, namespace: &str, nonce: &str, ttl: Duration) -> Result<bool> {
        let now = now_secs();
        let expires_at = now + ttl.as_secs() as i64;

        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        // Inserts fresh nonces; overwrites only rows whose window has lapsed.
        let changed = conn.execute(
            "INSERT INTO nonces (namespace, nonce, first_seen_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (namespace, nonce) DO UPDATE SET
                 first_seen_at = excluded.first_seen_at,
                 expires_at = excluded.expires_at
             WHERE nonces.expires_at <= ?3",
            params![namespace, nonce, now, expires_at],
        )?;

        Ok(changed == 1)
    }

    fn purge_expired(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let dropped = conn.execute(
            "DELETE FROM nonces WHERE expires_at <= ?1",
            params![now_secs()],
        )?;
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn backends() -> Vec<Box<dyn NonceStore>> {
        vec![
            Box::new(MemoryNonceStore::new()),
            Box::new(SqliteNonceStore::open_memory().unwrap()),
        ]
    }

    #[test]
    fn test_first_reserve_succeeds_second_fails() {
        for store in backends() {
            assert!(store.reserve("default", "nonce-1", TTL).unwrap());
            assert!(!store.reserve("default", "nonce-1", TTL).unwrap());
        }
    }

    #[test]
    fn test_namespaces_are_independent() {
        for store in backends() {
            assert!(store.reserve("tenant-a", "nonce-1", TTL).unwrap());
            assert!(store.reserve("tenant-b", "nonce-1", TTL).unwrap());
            assert!(!store.reserve("tenant-a", "nonce-1", TTL).unwrap());
        }
    }

    #[test]
    fn test_expired_nonce_can_be_reclaimed() {
        for store in backends() {
            assert!(store.reserve("default", "n", Duration::ZERO).unwrap());
            // TTL of zero expires immediately.
            assert!(store.reserve("default", "n", TTL).unwrap());
            assert!(!store.reserve("default", "n", TTL).unwrap());
        }
    }

    #[test]
    fn test_purge_drops_only_expired() {
        for store in backends() {
            store.reserve("default", "expired", Duration::ZERO).unwrap();
            store.reserve("default", "live", TTL).unwrap();

            assert_eq!(store.purge_expired().unwrap(), 1);
            assert!(!store.reserve("default", "live", TTL).unwrap());
            assert!(store.reserve("default", "expired", TTL).unwrap());
        }
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonces.db");

        {
            let store = SqliteNonceStore::open(&path).unwrap();
            assert!(store.reserve("default", "persisted", TTL).unwrap());
        }

        let store = SqliteNonceStore::open(&path).unwrap();
        assert!(!store.reserve("default", "persisted", TTL).unwrap());
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        use std::sync::Arc;

        let store: Arc<dyn NonceStore> = Arc::new(MemoryNonceStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.reserve("default", "contested", TTL).unwrap()
            }));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
