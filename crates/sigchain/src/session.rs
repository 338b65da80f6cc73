//! Session chains: independent append-only namespaces within one store.
//!
//! A session has its own head pointer and its own root record, so multiple
//! workflows can run against one store without interleaving their chains.

use serde_json::Value;

use sigchain_core::SignedRecord;
use sigchain_store::{FsckReport, Namespace};

use crate::context::Sigchain;
use crate::error::Result;

/// Handle on one session chain. Cheap to create; the chain itself is only
/// materialized on the first append.
pub struct Session<'a> {
    ctx: &'a Sigchain,
    namespace: Namespace,
    id: String,
}

impl<'a> Session<'a> {
    pub(crate) fn new(ctx: &'a Sigchain, id: String) -> Self {
        Self {
            ctx,
            namespace: Namespace::Session(id.clone()),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sign a payload chained to this session's head and append it.
    pub fn append(&self, subject_id: &str, payload: Value) -> Result<SignedRecord> {
        self.ctx.append_in(&self.namespace, subject_id, payload)
    }

    /// This session's records, newest first.
    pub fn log(&self) -> Result<Vec<SignedRecord>> {
        self.ctx.log_in(&self.namespace)
    }

    /// This session's newest record, if any.
    pub fn head(&self) -> Result<Option<SignedRecord>> {
        self.ctx.head_in(&self.namespace)
    }

    /// Re-verify this session's stored chain from disk.
    pub fn verify(&self) -> Result<FsckReport> {
        self.ctx.fsck_in(&self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigchainConfig;
    use serde_json::json;

    #[test]
    fn test_sessions_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Sigchain::open(SigchainConfig::new().chain_dir(dir.path())).unwrap();

        let a = ctx.session("workflow-a");
        let b = ctx.session("workflow-b");
        a.append("fetch", json!({"n": 1})).unwrap();
        b.append("fetch", json!({"n": 2})).unwrap();
        a.append("analyze", json!({"n": 3})).unwrap();

        assert_eq!(a.log().unwrap().len(), 2);
        assert_eq!(b.log().unwrap().len(), 1);
        assert!(a.verify().unwrap().valid);
        assert!(b.verify().unwrap().valid);
        assert_eq!(
            ctx.sessions().unwrap(),
            vec!["workflow-a".to_string(), "workflow-b".to_string()]
        );
    }

    #[test]
    fn test_session_chain_links() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Sigchain::open(SigchainConfig::new().chain_dir(dir.path())).unwrap();

        let session = ctx.session("s");
        let first = session.append("a", json!(1)).unwrap();
        let second = session.append("b", json!(2)).unwrap();

        assert!(first.parent_signature.is_none());
        assert_eq!(second.parent_signature, Some(first.signature));
        assert_eq!(
            session.head().unwrap().map(|r| r.record_id),
            Some(second.record_id)
        );
    }
}
