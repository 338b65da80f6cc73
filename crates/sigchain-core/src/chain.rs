//! Chain verification: parent-signature linkage over ordered records.
//!
//! A chain is an ordered slice of records, root first. Each record after the
//! root must carry the previous record's signature as its parent. Verifying a
//! chain checks linkage and signatures only; it never consumes nonces, so the
//! same chain can be re-verified any number of times.

use thiserror::Error;

use crate::crypto::{Ed25519PublicKey, KeyId};
use crate::error::CoreError;
use crate::record::SignedRecord;

/// Why a chain failed verification, and where.
///
/// The index always refers to the first record at which verification failed;
/// records after it are not examined.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("record {index} signed by unknown key {key_id}")]
    UnknownKey { index: usize, key_id: KeyId },

    #[error("record {index} failed verification")]
    InvalidRecord {
        index: usize,
        #[source]
        source: CoreError,
    },

    #[error("record {index} does not link to its predecessor")]
    BrokenLink { index: usize },
}

impl ChainError {
    /// Index of the first failing record.
    pub fn index(&self) -> usize {
        match self {
            ChainError::UnknownKey { index, .. }
            | ChainError::InvalidRecord { index, .. }
            | ChainError::BrokenLink { index } => *index,
        }
    }
}

/// Verify an ordered chain of records, root first.
///
/// For each record the link to its predecessor is checked before the
/// signature, so a record that is both unlinked and tampered reports
/// `BrokenLink`. Keys are looked up through `resolve`, which maps a claimed
/// key id to its public key; returning `None` yields `UnknownKey`.
///
/// An empty slice is trivially valid.
pub fn verify_chain<F>(records: &[SignedRecord], mut resolve: F) -> Result<(), ChainError>
where
    F: FnMut(&KeyId) -> Option<Ed25519PublicKey>,
{
    for (index, record) in records.iter().enumerate() {
        if index > 0 {
            let expected = &records[index - 1].signature;
            match &record.parent_signature {
                Some(parent) if parent == expected => {}
                _ => return Err(ChainError::BrokenLink { index }),
            }
        }

        let key = resolve(&record.key_id).ok_or_else(|| ChainError::UnknownKey {
            index,
            key_id: record.key_id.clone(),
        })?;

        record
            .verify_with_key(&key)
            .map_err(|source| ChainError::InvalidRecord { index, source })?;
    }

    Ok(())
}
