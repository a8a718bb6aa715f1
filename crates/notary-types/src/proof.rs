use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprint, NodeHash};
use crate::ids::{BatchId, TxRef};
use crate::record::AnchorRecord;

/// Self-contained inclusion proof for one anchored artifact.
///
/// This is the object handed to external verifiers. Together with the
/// artifact bytes (or just its fingerprint) it is enough to recompute the
/// Merkle root; `batch_id` lets the verifier cross-check the root on the
/// ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub fingerprint: Fingerprint,
    pub root: NodeHash,
    pub proof: Vec<NodeHash>,
    pub batch_id: BatchId,
    pub tx_ref: TxRef,
    pub issued_at: DateTime<Utc>,
}

impl ProofBundle {
    /// Build the export from an anchored record.
    ///
    /// Returns `None` when the record has not been anchored yet.
    pub fn from_record(record: &AnchorRecord) -> Option<Self> {
        if !record.is_anchored() {
            return None;
        }
        Some(Self {
            fingerprint: record.fingerprint,
            root: record.merkle_root?,
            proof: record.proof.clone()?,
            batch_id: record.batch_id.clone()?,
            tx_ref: record.tx_ref.clone()?,
            issued_at: record.issued_at,
        })
    }
}

/// Proof material supplied by a caller that has no database record.
///
/// Unlike [`ProofBundle`] the batch id is optional: without it only the local
/// proof check runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedProof {
    pub fingerprint: Fingerprint,
    pub root: NodeHash,
    #[serde(default)]
    pub proof: Vec<NodeHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

impl From<ProofBundle> for DetachedProof {
    fn from(bundle: ProofBundle) -> Self {
        Self {
            fingerprint: bundle.fingerprint,
            root: bundle.root,
            proof: bundle.proof,
            batch_id: Some(bundle.batch_id),
        }
    }
}
