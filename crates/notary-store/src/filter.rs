use chrono::{DateTime, Utc};

use notary_types::{
    AnchorRecord, AnchorStatus, ArtifactId, ArtifactKind, AttemptId, BatchId, Fingerprint,
    NodeHash, TxRef,
};

/// Conjunctive filter over anchor records. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub status: Option<AnchorStatus>,
    pub kind: Option<ArtifactKind>,
    pub fingerprint: Option<Fingerprint>,
    pub batch_id: Option<BatchId>,
    pub claim: Option<AttemptId>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn status(status: AnchorStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn fingerprint(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint: Some(fingerprint),
            ..Default::default()
        }
    }

    pub fn batch(batch_id: BatchId) -> Self {
        Self {
            batch_id: Some(batch_id),
            ..Default::default()
        }
    }

    pub fn claimed_by(attempt: AttemptId) -> Self {
        Self {
            claim: Some(attempt),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the record satisfies every set field.
    pub fn matches(&self, record: &AnchorRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if self.kind.is_some_and(|k| k != record.kind) {
            return false;
        }
        if self.fingerprint.is_some_and(|fp| fp != record.fingerprint) {
            return false;
        }
        if let Some(ref batch_id) = self.batch_id {
            if record.batch_id.as_ref() != Some(batch_id) {
                return false;
            }
        }
        if self.claim.is_some() && self.claim != record.claim {
            return false;
        }
        true
    }
}

/// Ledger result applied to every record of one claim.
#[derive(Clone, Debug)]
pub struct ClaimCommit {
    pub batch_id: BatchId,
    pub root: NodeHash,
    pub tx_ref: TxRef,
    pub anchored_at: DateTime<Utc>,
    /// Inclusion proof per claimed artifact.
    pub proofs: Vec<(ArtifactId, Vec<NodeHash>)>,
}
