//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use serde_json::{json, Value};
use tempfile::TempDir;

use sigchain::{Sigchain, SigchainConfig};
use sigchain_core::{Keypair, RecordBuilder, SignedRecord};

/// A context with a chain store in a temp directory.
///
/// The directory lives as long as the fixture.
pub struct TestFixture {
    pub ctx: Sigchain,
    pub dir: TempDir,
}

impl TestFixture {
    /// Persistent chain store, memory nonces, default tenant.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ctx = Sigchain::open(SigchainConfig::new().chain_dir(dir.path()))
            .expect("open context");
        Self { ctx, dir }
    }

    /// Like [`TestFixture::new`] but with replay checking off, for tests
    /// that verify the same record repeatedly.
    pub fn without_nonce_check() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ctx = Sigchain::open(
            SigchainConfig::new()
                .chain_dir(dir.path())
                .without_nonce_check(),
        )
        .expect("open context");
        Self { ctx, dir }
    }

    /// Append `n` records to the default chain.
    pub fn append_n(&self, n: usize) -> Vec<SignedRecord> {
        (0..n)
            .map(|i| {
                self.ctx
                    .append(&format!("step-{i}"), json!({"i": i}))
                    .expect("append record")
            })
            .collect()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a standalone chain of `n` records signed by one keypair, without
/// any store.
pub fn make_chain(keypair: &Keypair, n: usize) -> Vec<SignedRecord> {
    let mut records: Vec<SignedRecord> = Vec::with_capacity(n);
    for i in 0..n {
        let mut builder =
            RecordBuilder::new(format!("step-{i}"), json!({"i": i})).timestamp(1000 + i as i64);
        if let Some(prev) = records.last() {
            builder = builder.parent(prev.signature);
        }
        records.push(builder.sign(keypair).expect("sign record"));
    }
    records
}

/// Sign a single record with a fixed payload shape.
pub fn make_record(keypair: &Keypair, subject_id: &str, payload: Value) -> SignedRecord {
    RecordBuilder::new(subject_id, payload)
        .timestamp(1736870400)
        .sign(keypair)
        .expect("sign record")
}
