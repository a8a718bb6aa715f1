use sha2::{Digest, Sha256};

use notary_types::{Fingerprint, NodeHash};

/// Compute the fingerprint of an artifact's bytes.
///
/// This is the issue-time hook: it runs synchronously whenever a new artifact
/// is created. Plain SHA-256, no domain prefix, so any third party can
/// reproduce it with standard tools (`sha256sum`).
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finish(hasher)
}

/// Sorted-pair parent hash: `SHA-256(min(a, b) || max(a, b))`.
///
/// Sorting the children makes the parent independent of left/right position,
/// so a proof is just the list of sibling hashes.
pub fn hash_pair(a: &NodeHash, b: &NodeHash) -> NodeHash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    finish(hasher)
}

fn finish(hasher: Sha256) -> Fingerprint {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Fingerprint::from_hash(bytes)
}

/// Streaming fingerprinter for artifacts read in chunks.
#[derive(Clone, Default)]
pub struct Fingerprinter {
    inner: Sha256,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(self) -> Fingerprint {
        finish(self.inner)
    }

    /// Verify that data produces the expected fingerprint.
    pub fn verify(data: &[u8], expected: &Fingerprint) -> bool {
        fingerprint(data) == *expected
    }
}
