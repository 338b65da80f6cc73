//! Merkle trees over chunked payloads, for partial disclosure.
//!
//! A signer splits a large payload into chunks, builds a tree, and signs only
//! the root. Any single chunk can later be proven to belong to the signed
//! payload without revealing the others.
//!
//! Hashing uses domain separation: leaves are `sha256(0x00 || chunk)`,
//! interior nodes `sha256(0x01 || left || right)`. This makes it impossible
//! to present an interior node as a leaf or vice versa. At odd levels the
//! last node is paired with itself.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::Sha256Hash;
use crate::error::CoreError;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

fn leaf_hash(chunk: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(chunk);
    Sha256Hash(hasher.finalize().into())
}

fn node_hash(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Sha256Hash(hasher.finalize().into())
}

/// A Merkle tree retaining every level, so proofs for any leaf can be
/// extracted after construction.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] is the leaves; the last level holds the single root.
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    /// Build a tree over the given chunks. Fails on zero chunks.
    pub fn from_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> Result<Self, CoreError> {
        if chunks.is_empty() {
            return Err(CoreError::EmptyTree);
        }

        let leaves: Vec<Sha256Hash> = chunks.iter().map(|c| leaf_hash(c.as_ref())).collect();
        let mut levels = vec![leaves];

        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(node_hash(left, right));
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The signed root hash.
    pub fn root(&self) -> Sha256Hash {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Extract the inclusion proof for the leaf at `index`.
    pub fn get_proof(&self, index: usize) -> Result<MerkleProof, CoreError> {
        if index >= self.len() {
            return Err(CoreError::ProofOutOfRange {
                index,
                leaves: self.len(),
            });
        }

        let mut siblings = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            // The last node at an odd level is its own sibling.
            let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
            siblings.push(*sibling);
            idx /= 2;
        }

        Ok(MerkleProof {
            leaf_index: index,
            siblings,
        })
    }
}

/// An inclusion proof: the sibling hashes along the path from a leaf to the
/// root, leaf level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub siblings: Vec<Sha256Hash>,
}

/// Verify that `chunk` is the leaf at `proof.leaf_index` of the tree with the
/// given root.
pub fn verify_proof(chunk: &[u8], proof: &MerkleProof, root: &Sha256Hash) -> bool {
    let mut hash = leaf_hash(chunk);
    let mut idx = proof.leaf_index;

    for sibling in &proof.siblings {
        hash = if idx % 2 == 0 {
            node_hash(&hash, sibling)
        } else {
            node_hash(sibling, &hash)
        };
        idx /= 2;
    }

    hash == *root
}
