//! The Sigchain context: unified API over keys, nonces, tools, and the
//! chain store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tracing::debug;

use sigchain_core::{
    verify_chain, verify_proof, KeyId, MerkleProof, MerkleTree, RecordBuilder, SignedRecord,
};
use sigchain_store::{
    ChainStatus, ChainStore, FsckReport, MemoryNonceStore, Namespace, NonceStore, SqliteNonceStore,
};

use crate::config::{NonceBackend, SigchainConfig};
use crate::error::{Result, SigchainError};
use crate::keys::KeyManager;
use crate::registry::{Tool, ToolRegistry};
use crate::session::Session;

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A trust context.
///
/// Brings together:
/// - a [`KeyManager`] holding the tenant's signing keys
/// - a nonce store enforcing single verification per record
/// - an optional append-only [`ChainStore`]
/// - a [`ToolRegistry`] of operations whose results get signed
pub struct Sigchain {
    config: SigchainConfig,
    keys: KeyManager,
    nonces: Box<dyn NonceStore>,
    chain: Option<ChainStore>,
    tools: ToolRegistry,
}

impl Sigchain {
    /// Open a context from configuration, loading keys and the chain store.
    pub fn open(config: SigchainConfig) -> Result<Self> {
        let keys = KeyManager::open(config.key_file.clone())?;

        let nonces: Box<dyn NonceStore> = match &config.nonce_backend {
            NonceBackend::Memory => Box::new(MemoryNonceStore::new()),
            NonceBackend::Sqlite(path) => Box::new(SqliteNonceStore::open(path)?),
        };

        let chain = config
            .chain_dir
            .as_ref()
            .map(ChainStore::open)
            .transpose()?;

        Ok(Self {
            config,
            keys,
            nonces,
            chain,
            tools: ToolRegistry::new(),
        })
    }

    /// Open with default configuration: memory nonces, no persistence.
    pub fn open_default() -> Result<Self> {
        Self::open(SigchainConfig::default())
    }

    // ── Signing ─────────────────────────────────────────────────────────

    /// Sign a payload as a standalone (unchained) record.
    pub fn sign(&self, subject_id: &str, payload: Value) -> Result<SignedRecord> {
        let keypair = self.keys.active(&self.config.tenant_id)?;
        let record = RecordBuilder::new(subject_id, payload)
            .timestamp(now_secs())
            .sign(&keypair)?;
        Ok(record)
    }

    /// Sign a payload chained to an explicit parent record.
    pub fn sign_with_parent(
        &self,
        subject_id: &str,
        payload: Value,
        parent: &SignedRecord,
    ) -> Result<SignedRecord> {
        let keypair = self.keys.active(&self.config.tenant_id)?;
        let record = RecordBuilder::new(subject_id, payload)
            .timestamp(now_secs())
            .parent(parent.signature)
            .sign(&keypair)?;
        Ok(record)
    }

    /// Sign a chunked payload: only the Merkle root goes into the record,
    /// so any chunk can later be disclosed and proven individually.
    ///
    /// Returns the record and the tree for extracting proofs.
    pub fn sign_chunks<C: AsRef<[u8]>>(
        &self,
        subject_id: &str,
        chunks: &[C],
    ) -> Result<(SignedRecord, MerkleTree)> {
        let tree = MerkleTree::from_chunks(chunks)?;
        let payload = json!({
            "merkle_root": tree.root().to_hex(),
            "chunk_count": tree.len(),
        });
        let record = self.sign(subject_id, payload)?;
        Ok((record, tree))
    }

    // ── Verification ────────────────────────────────────────────────────

    /// Verify a record: key resolution, signature, then nonce consumption.
    ///
    /// The nonce is consumed only after the signature checks out, and only
    /// on the first successful verification; a second call for the same
    /// record fails with [`SigchainError::NonceReplay`].
    pub fn verify(&self, record: &SignedRecord) -> Result<()> {
        let key = self
            .keys
            .resolve(&self.config.tenant_id, &record.key_id)
            .ok_or_else(|| SigchainError::UnknownKey {
                key_id: record.key_id.clone(),
            })?;

        record.verify_with_key(&key)?;

        if self.config.enable_nonce {
            let fresh =
                self.nonces
                    .reserve(&self.config.tenant_id, &record.nonce, self.config.nonce_ttl)?;
            if !fresh {
                debug!(record_id = %record.record_id, nonce = %record.nonce, "nonce replay rejected");
                return Err(SigchainError::NonceReplay {
                    nonce: record.nonce.clone(),
                });
            }
        }

        Ok(())
    }

    /// Verify an ordered chain of records, root first.
    ///
    /// Signature and linkage only; nonces are not consumed, so chains stay
    /// re-verifiable.
    pub fn verify_chain(&self, records: &[SignedRecord]) -> Result<()> {
        verify_chain(records, |key_id| {
            self.keys.resolve(&self.config.tenant_id, key_id)
        })?;
        Ok(())
    }

    /// Verify that a disclosed chunk belongs to a chunked record.
    ///
    /// The record's signature is checked without consuming its nonce, so
    /// any number of chunks of one record can be verified independently.
    pub fn verify_chunk(
        &self,
        record: &SignedRecord,
        chunk: &[u8],
        proof: &MerkleProof,
    ) -> Result<bool> {
        let key = self
            .keys
            .resolve(&self.config.tenant_id, &record.key_id)
            .ok_or_else(|| SigchainError::UnknownKey {
                key_id: record.key_id.clone(),
            })?;
        record.verify_with_key(&key)?;

        let root_hex = record.payload["merkle_root"].as_str().unwrap_or("");
        let root = sigchain_core::Sha256Hash::from_hex(root_hex)?;
        Ok(verify_proof(chunk, proof, &root))
    }

    // ── Chain store ─────────────────────────────────────────────────────

    /// Sign a payload chained to the stored head and append it.
    pub fn append(&self, subject_id: &str, payload: Value) -> Result<SignedRecord> {
        self.append_in(&Namespace::Default, subject_id, payload)
    }

    pub(crate) fn append_in(
        &self,
        namespace: &Namespace,
        subject_id: &str,
        payload: Value,
    ) -> Result<SignedRecord> {
        let chain = self.chain()?;
        let keypair = self.keys.active(&self.config.tenant_id)?;

        let mut builder = RecordBuilder::new(subject_id, payload).timestamp(now_secs());
        if let Some(head) = chain.head(namespace)? {
            builder = builder.parent(head.signature);
        }
        let record = builder.sign(&keypair)?;
        chain.append(&record, namespace)?;
        Ok(record)
    }

    /// Stored records of the default chain, newest first.
    pub fn log(&self) -> Result<Vec<SignedRecord>> {
        Ok(self.chain()?.log(&Namespace::Default)?)
    }

    /// Load one stored record by id.
    pub fn show(&self, record_id: &str) -> Result<SignedRecord> {
        Ok(self.chain()?.get(record_id)?)
    }

    /// Top-level fields differing between two stored records.
    pub fn diff(&self, record_id_a: &str, record_id_b: &str) -> Result<Vec<String>> {
        Ok(self.chain()?.diff(record_id_a, record_id_b)?)
    }

    /// Summary of the default chain.
    pub fn status(&self) -> Result<ChainStatus> {
        Ok(self.chain()?.status(&Namespace::Default)?)
    }

    /// Re-verify the entire stored default chain from disk.
    pub fn verify_store(&self) -> Result<FsckReport> {
        self.fsck_in(&Namespace::Default)
    }

    pub(crate) fn fsck_in(&self, namespace: &Namespace) -> Result<FsckReport> {
        let report = self.chain()?.fsck(namespace, |key_id: &KeyId| {
            self.keys.resolve(&self.config.tenant_id, key_id)
        })?;
        Ok(report)
    }

    pub(crate) fn log_in(&self, namespace: &Namespace) -> Result<Vec<SignedRecord>> {
        Ok(self.chain()?.log(namespace)?)
    }

    pub(crate) fn head_in(&self, namespace: &Namespace) -> Result<Option<SignedRecord>> {
        Ok(self.chain()?.head(namespace)?)
    }

    /// Ids of all session chains.
    pub fn sessions(&self) -> Result<Vec<String>> {
        Ok(self.chain()?.sessions()?)
    }

    /// A handle on a session chain, creating its namespace lazily.
    pub fn session(&self, session_id: impl Into<String>) -> Session<'_> {
        Session::new(self, session_id.into())
    }

    /// Export all stored records of the default chain, oldest first, as a
    /// JSON array ready for an external verifier.
    pub fn export(&self) -> Result<Value> {
        let mut records = self.log()?;
        records.reverse();
        Ok(serde_json::to_value(records).map_err(sigchain_store::StoreError::from)?)
    }

    fn chain(&self) -> Result<&ChainStore> {
        self.chain.as_ref().ok_or(SigchainError::ChainDisabled)
    }

    // ── Keys ────────────────────────────────────────────────────────────

    /// The active signing key id.
    pub fn key_id(&self) -> Result<KeyId> {
        self.keys.key_id(&self.config.tenant_id)
    }

    /// Rotate the signing key. Returns `(old, new)` key ids; records signed
    /// by the old key keep verifying.
    pub fn rotate_keys(&self) -> Result<(KeyId, KeyId)> {
        self.keys.active(&self.config.tenant_id)?;
        self.keys.rotate(&self.config.tenant_id)
    }

    /// Export the active public key as `(key_id, base64)`.
    pub fn export_public_key(&self) -> Result<(KeyId, String)> {
        self.keys.export_public(&self.config.tenant_id)
    }

    /// Trust another party's public key for verification.
    pub fn trust_key(&self, encoded: &str) -> Result<KeyId> {
        let key = sigchain_core::Ed25519PublicKey::from_base64(encoded)?;
        self.keys.trust(key)
    }

    // ── Tools ───────────────────────────────────────────────────────────

    /// Register a tool.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        self.tools.register(tool);
    }

    /// Registered tool names.
    pub fn tools(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Invoke a registered tool and sign its result.
    ///
    /// The payload captures the tool name, the arguments, and the result.
    /// With a chain store configured the record is appended; otherwise it is
    /// returned standalone.
    pub fn invoke_signed(&self, name: &str, args: Value) -> Result<SignedRecord> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| SigchainError::UnknownTool(name.to_string()))?;

        let result = tool.invoke(&args).map_err(|e| SigchainError::ToolFailed {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let payload = json!({
            "tool": name,
            "args": args,
            "result": result,
        });

        if self.chain.is_some() {
            self.append(name, payload)
        } else {
            self.sign(name, payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FnTool;
    use serde_json::json;

    fn memory_context() -> Sigchain {
        Sigchain::open_default().unwrap()
    }

    #[test]
    fn test_sign_verify_then_replay() {
        let ctx = memory_context();
        let record = ctx.sign("weather", json!({"city": "Paris", "temp": 22})).unwrap();

        ctx.verify(&record).unwrap();
        assert!(matches!(
            ctx.verify(&record),
            Err(SigchainError::NonceReplay { .. })
        ));
    }

    #[test]
    fn test_nonce_check_disabled() {
        let ctx = Sigchain::open(SigchainConfig::new().without_nonce_check()).unwrap();
        let record = ctx.sign("t", json!(1)).unwrap();
        ctx.verify(&record).unwrap();
        ctx.verify(&record).unwrap();
    }

    #[test]
    fn test_chain_ops_require_chain_dir() {
        let ctx = memory_context();
        assert!(matches!(ctx.log(), Err(SigchainError::ChainDisabled)));
        assert!(matches!(
            ctx.append("t", json!(1)),
            Err(SigchainError::ChainDisabled)
        ));
    }

    #[test]
    fn test_invoke_signed_without_chain() {
        let ctx = memory_context();
        ctx.register_tool(Arc::new(FnTool::new("echo", |args: &Value| {
            Ok(args.clone())
        })));

        let record = ctx.invoke_signed("echo", json!({"msg": "hi"})).unwrap();
        assert_eq!(record.subject_id, "echo");
        assert_eq!(record.payload["result"]["msg"], "hi");
        ctx.verify(&record).unwrap();
    }

    #[test]
    fn test_unknown_tool() {
        let ctx = memory_context();
        assert!(matches!(
            ctx.invoke_signed("nope", json!({})),
            Err(SigchainError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_failing_tool_signs_nothing() {
        let ctx = memory_context();
        ctx.register_tool(Arc::new(FnTool::new("boom", |_: &Value| {
            anyhow::bail!("exploded")
        })));

        assert!(matches!(
            ctx.invoke_signed("boom", json!({})),
            Err(SigchainError::ToolFailed { .. })
        ));
    }

    #[test]
    fn test_sign_chunks_and_verify_one() {
        let ctx = Sigchain::open(SigchainConfig::new().without_nonce_check()).unwrap();
        let chunks: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 16]).collect();

        let (record, tree) = ctx.sign_chunks("blob", &chunks).unwrap();
        assert_eq!(record.payload["chunk_count"], 4);

        let proof = tree.get_proof(2).unwrap();
        assert!(ctx.verify_chunk(&record, &chunks[2], &proof).unwrap());
        assert!(!ctx.verify_chunk(&record, b"forged", &proof).unwrap());
    }
}
