//! Append-only chain store, laid out like a git object database.
//!
//! On disk:
//!
//! ```text
//! <root>/
//!   config.json             store format metadata
//!   HEAD                    record_id of the default chain's newest record
//!   objects/<record_id>.json   one immutable file per record
//!   refs/sessions/<id>      per-session head pointers
//! ```
//!
//! Records are never modified or deleted. Appending writes and syncs the
//! object file before the head pointer moves, and both go through a temp
//! file plus rename, so a crash leaves at worst an orphaned temp file or
//! object, never a head naming a missing record and never a half-written
//! file under its final name.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sigchain_core::{verify_chain, ChainError, Ed25519PublicKey, KeyId, SignedRecord};

use crate::error::{Result, StoreError};

/// Which chain within the store a record belongs to.
///
/// Every namespace is an independent append-only chain with its own head
/// pointer and its own root record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The main chain, tracked by `HEAD`.
    Default,
    /// A session chain, tracked by `refs/sessions/<id>`.
    Session(String),
}

impl Namespace {
    fn pointer_path(&self, root: &Path) -> PathBuf {
        match self {
            Namespace::Default => root.join("HEAD"),
            Namespace::Session(id) => root.join("refs").join("sessions").join(id),
        }
    }

    fn key(&self) -> String {
        match self {
            Namespace::Default => "HEAD".to_string(),
            Namespace::Session(id) => format!("sessions/{id}"),
        }
    }
}

/// Store format metadata, written once at initialization.
#[derive(Debug, Serialize, Deserialize)]
struct StoreConfig {
    version: u32,
    hash_algorithm: String,
    signature_scheme: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            hash_algorithm: "sha256".to_string(),
            signature_scheme: "ed25519".to_string(),
        }
    }
}

/// Summary of one chain, for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    /// Number of records from head back to the root.
    pub length: usize,
    /// record_id of the newest record, if any.
    pub head: Option<String>,
    /// Record counts per subject_id.
    pub subjects: HashMap<String, usize>,
}

/// Outcome of a full-chain integrity walk.
#[derive(Debug, Clone)]
pub struct FsckReport {
    pub valid: bool,
    /// Records examined, head to the point of failure or the root.
    pub length: usize,
    pub head: Option<String>,
    pub error: Option<FsckError>,
}

/// The first integrity failure found, root-first.
#[derive(Debug, Clone)]
pub struct FsckError {
    /// Position from the root, when the chain could be fully loaded.
    pub index: Option<usize>,
    pub record_id: String,
    pub reason: String,
}

struct Inner {
    /// namespace key -> record_id of the newest record.
    heads: HashMap<String, String>,
    /// base64 signature -> record_id, for walking parent links.
    sig_index: HashMap<String, String>,
}

/// Append-only signed-record store rooted at a directory.
pub struct ChainStore {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl ChainStore {
    /// Open a store at `root`, initializing the directory layout on first
    /// use. Existing objects are scanned to rebuild the signature index,
    /// and every head pointer is checked against the object directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("refs").join("sessions"))?;

        let config_path = root.join("config.json");
        if !config_path.exists() {
            let config = serde_json::to_string_pretty(&StoreConfig::default())?;
            atomic_write(&config_path, config.as_bytes())?;
        }

        let mut sig_index = HashMap::new();
        for entry in fs::read_dir(root.join("objects"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Unreadable objects are left out of the index rather than
            // blocking reopen; if one is reachable from a head, fsck
            // reports the break.
            match read_object(&path) {
                Ok(record) => {
                    sig_index.insert(record.signature.to_base64(), record.record_id);
                }
                Err(StoreError::CorruptObject { record_id, reason }) => {
                    warn!(%record_id, %reason, "skipping unreadable object");
                }
                Err(e) => return Err(e),
            }
        }

        let mut heads = HashMap::new();
        if let Some(head) = read_pointer(&root.join("HEAD"))? {
            heads.insert(Namespace::Default.key(), head);
        }
        for entry in fs::read_dir(root.join("refs").join("sessions"))? {
            let path = entry?.path();
            if let (Some(id), Some(head)) = (
                path.file_name().and_then(|n| n.to_str()),
                read_pointer(&path)?,
            ) {
                heads.insert(Namespace::Session(id.to_string()).key(), head);
            }
        }

        for head in heads.values() {
            if !root.join("objects").join(format!("{head}.json")).exists() {
                return Err(StoreError::MissingObject {
                    record_id: head.clone(),
                });
            }
        }

        Ok(Self {
            root,
            inner: Mutex::new(Inner { heads, sig_index }),
        })
    }

    /// Append a record to a namespace's chain.
    ///
    /// The record's parent signature must equal the current head's signature
    /// (or be absent when the chain is empty). The object file is written
    /// and synced before the head pointer advances.
    pub fn append(&self, record: &SignedRecord, namespace: &Namespace) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;

        match inner.heads.get(&namespace.key()) {
            Some(head_id) => {
                let head = self.load(head_id)?;
                if record.parent_signature != Some(head.signature) {
                    return Err(StoreError::ParentMismatch {
                        record_id: record.record_id.clone(),
                    });
                }
            }
            None => {
                if record.parent_signature.is_some() {
                    return Err(StoreError::RootHasParent {
                        record_id: record.record_id.clone(),
                    });
                }
            }
        }

        let mut json = serde_json::to_string_pretty(record)?;
        json.push('\n');
        atomic_write(&self.object_path(&record.record_id), json.as_bytes())?;

        atomic_write(&namespace.pointer_path(&self.root), record.record_id.as_bytes())?;

        inner
            .sig_index
            .insert(record.signature.to_base64(), record.record_id.clone());
        inner
            .heads
            .insert(namespace.key(), record.record_id.clone());

        debug!(
            record_id = %record.record_id,
            subject = %record.subject_id,
            namespace = %namespace.key(),
            "appended record"
        );
        Ok(())
    }

    /// Load a record by id.
    pub fn get(&self, record_id: &str) -> Result<SignedRecord> {
        self.load(record_id)
    }

    /// The newest record of a namespace, if the chain is non-empty.
    pub fn head(&self, namespace: &Namespace) -> Result<Option<SignedRecord>> {
        let head_id = {
            let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
            inner.heads.get(&namespace.key()).cloned()
        };
        head_id.map(|id| self.load(&id)).transpose()
    }

    /// All records of a namespace, newest first.
    pub fn log(&self, namespace: &Namespace) -> Result<Vec<SignedRecord>> {
        Ok(self.walk(namespace)?.records)
    }

    /// Top-level wire fields that differ between two records.
    pub fn diff(&self, record_id_a: &str, record_id_b: &str) -> Result<Vec<String>> {
        let a = serde_json::to_value(self.load(record_id_a)?)?;
        let b = serde_json::to_value(self.load(record_id_b)?)?;
        let (a, b) = match (a.as_object(), b.as_object()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(Vec::new()),
        };

        let mut changed: Vec<String> = a
            .iter()
            .filter(|(key, value)| b.get(*key) != Some(value))
            .map(|(key, _)| key.clone())
            .collect();
        changed.sort();
        Ok(changed)
    }

    /// Summarize a namespace's chain.
    pub fn status(&self, namespace: &Namespace) -> Result<ChainStatus> {
        let walk = self.walk(namespace)?;
        let mut subjects: HashMap<String, usize> = HashMap::new();
        for record in &walk.records {
            *subjects.entry(record.subject_id.clone()).or_default() += 1;
        }
        Ok(ChainStatus {
            length: walk.records.len(),
            head: walk.records.first().map(|r| r.record_id.clone()),
            subjects,
        })
    }

    /// Ids of all session chains with at least one record.
    pub fn sessions(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut ids: Vec<String> = inner
            .heads
            .keys()
            .filter_map(|key| key.strip_prefix("sessions/"))
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Walk a namespace's full chain and verify every link and signature.
    ///
    /// Keys are looked up through `resolve`. Integrity failures are reported
    /// in the returned [`FsckReport`], not as errors; `Err` means the store
    /// itself could not be read.
    pub fn fsck<F>(&self, namespace: &Namespace, resolve: F) -> Result<FsckReport>
    where
        F: FnMut(&KeyId) -> Option<Ed25519PublicKey>,
    {
        let walk = self.walk(namespace)?;
        let head = walk.records.first().map(|r| r.record_id.clone());

        if let Some(dangling) = walk.dangling {
            warn!(namespace = %namespace.key(), record_id = %dangling.record_id, "chain walk broken");
            return Ok(FsckReport {
                valid: false,
                length: walk.records.len(),
                head,
                error: Some(dangling),
            });
        }

        // Oldest first, so failure indexes count from the root.
        let mut chain = walk.records;
        chain.reverse();

        match verify_chain(&chain, resolve) {
            Ok(()) => Ok(FsckReport {
                valid: true,
                length: chain.len(),
                head,
                error: None,
            }),
            Err(err) => {
                let index = err.index();
                warn!(namespace = %namespace.key(), index, %err, "chain verification failed");
                Ok(FsckReport {
                    valid: false,
                    length: chain.len(),
                    head,
                    error: Some(FsckError {
                        index: Some(index),
                        record_id: chain[index].record_id.clone(),
                        reason: chain_error_reason(&err),
                    }),
                })
            }
        }
    }

    fn object_path(&self, record_id: &str) -> PathBuf {
        self.root.join("objects").join(format!("{record_id}.json"))
    }

    fn load(&self, record_id: &str) -> Result<SignedRecord> {
        let path = self.object_path(record_id);
        if !path.exists() {
            return Err(StoreError::NotFound {
                record_id: record_id.to_string(),
            });
        }
        read_object(&path)
    }

    /// Follow parent links from the head. Returns records newest first; if a
    /// parent signature resolves to no stored object, the walk stops and the
    /// break is reported.
    fn walk(&self, namespace: &Namespace) -> Result<Walk> {
        let (head_id, sig_index) = {
            let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
            (
                inner.heads.get(&namespace.key()).cloned(),
                inner.sig_index.clone(),
            )
        };

        let mut records = Vec::new();
        let mut current = head_id;
        while let Some(record_id) = current {
            let record = self.load(&record_id)?;
            let parent = record.parent_signature.map(|sig| sig.to_base64());
            records.push(record);

            current = match parent {
                None => None,
                Some(sig) => match sig_index.get(&sig) {
                    Some(parent_id) => Some(parent_id.clone()),
                    None => {
                        return Ok(Walk {
                            dangling: Some(FsckError {
                                index: None,
                                record_id,
                                reason: "parent signature matches no stored object".to_string(),
                            }),
                            records,
                        })
                    }
                },
            };
        }

        Ok(Walk {
            records,
            dangling: None,
        })
    }
}

struct Walk {
    /// Newest first.
    records: Vec<SignedRecord>,
    dangling: Option<FsckError>,
}

fn chain_error_reason(err: &ChainError) -> String {
    match err {
        ChainError::UnknownKey { key_id, .. } => format!("unknown key {key_id}"),
        ChainError::InvalidRecord { source, .. } => source.to_string(),
        ChainError::BrokenLink { .. } => "parent signature mismatch".to_string(),
    }
}

fn read_object(path: &Path) -> Result<SignedRecord> {
    let record_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| StoreError::CorruptObject {
        record_id,
        reason: e.to_string(),
    })
}

fn read_pointer(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let id = contents.trim().to_string();
            Ok((!id.is_empty()).then_some(id))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temp file in the same directory, then rename into place.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
