use notary_types::{Fingerprint, NodeHash, ProofBundle, FINGERPRINT_LEN};

use crate::hasher::hash_pair;

/// Errors from building a Merkle tree.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree from an empty batch")]
    EmptyBatch,

    #[error("invalid fingerprint at leaf {index}: expected {FINGERPRINT_LEN} bytes, got {len}")]
    InvalidFingerprint { index: usize, len: usize },
}

/// Binary Merkle tree over a batch of fingerprints.
///
/// Leaves are sorted byte-wise before construction, so the root is a pure
/// function of the leaf multiset. Parents use sorted-pair hashing
/// ([`hash_pair`]). When a level has an odd number of nodes the last node is
/// carried upward unchanged.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Level 0 = sorted leaves, last level = `[root]`.
    levels: Vec<Vec<NodeHash>>,
}

impl MerkleTree {
    /// Build a tree from a non-empty set of fingerprints.
    pub fn build(mut leaves: Vec<Fingerprint>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyBatch);
        }
        leaves.sort_unstable();

        let mut levels: Vec<Vec<NodeHash>> = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<NodeHash> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    // Odd node: promote unchanged.
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Build from raw byte strings, validating that each is exactly 32 bytes.
    pub fn from_raw_leaves<T: AsRef<[u8]>>(leaves: &[T]) -> Result<Self, MerkleError> {
        let parsed = leaves
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let raw = raw.as_ref();
                Fingerprint::from_slice(raw)
                    .map_err(|_| MerkleError::InvalidFingerprint { index, len: raw.len() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(parsed)
    }

    /// The root hash. For a single-leaf tree this is the leaf itself.
    pub fn root(&self) -> NodeHash {
        // `build` guarantees at least one level with exactly one node on top.
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Leaves in canonical (sorted) order.
    pub fn leaves(&self) -> &[Fingerprint] {
        &self.levels[0]
    }

    /// Inclusion proof for the leaf at `index` in canonical order.
    ///
    /// Levels where the node was promoted without a sibling contribute
    /// nothing to the proof.
    pub fn proof(&self, index: usize) -> Option<Vec<NodeHash>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            if sibling < level.len() {
                path.push(level[sibling]);
            }
            idx /= 2;
        }
        Some(path)
    }

    /// Inclusion proof for a specific fingerprint, if it is part of the tree.
    ///
    /// Duplicate leaves share a fingerprint; any of their proofs is valid.
    pub fn proof_for(&self, leaf: &Fingerprint) -> Option<Vec<NodeHash>> {
        let index = self.levels[0].binary_search(leaf).ok()?;
        self.proof(index)
    }
}

/// Recompute a root from a leaf and its sibling path and compare.
///
/// Needs no tree: this is what verifiers run against a stored or exported
/// proof.
pub fn verify_proof(leaf: &Fingerprint, proof: &[NodeHash], root: &NodeHash) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}

/// Verify an exported [`ProofBundle`] with no other state.
pub fn verify_bundle(bundle: &ProofBundle) -> bool {
    verify_proof(&bundle.fingerprint, &bundle.proof, &bundle.root)
}
