use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use notary_types::{
    AnchorRecord, AnchorStatus, ArtifactId, AttemptId, Batch, BatchStatus, Fingerprint, TxRef,
};

use crate::error::{StoreError, StoreResult};
use crate::filter::{ClaimCommit, RecordFilter};
use crate::traits::{BatchStore, RecordStore};

/// In-memory record and batch store.
///
/// Intended for tests and embedding. All state lives behind a single
/// `RwLock`, which is what makes `claim_unanchored` atomic: selection and
/// marking happen under one write guard.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<ArtifactId, AnchorRecord>,
    /// Issue order.
    order: Vec<ArtifactId>,
    by_fingerprint: HashMap<Fingerprint, Vec<ArtifactId>>,
    batches: BTreeMap<AttemptId, Batch>,
}

impl StoreState {
    fn ordered<'a>(&'a self) -> impl Iterator<Item = &'a AnchorRecord> + 'a {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: AnchorRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.records.contains_key(&record.artifact_id) {
            return Err(StoreError::DuplicateArtifact(record.artifact_id));
        }
        let id = record.artifact_id.clone();
        state
            .by_fingerprint
            .entry(record.fingerprint)
            .or_default()
            .push(id.clone());
        state.order.push(id.clone());
        state.records.insert(id, record);
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> StoreResult<Option<AnchorRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn find(&self, filter: &RecordFilter) -> StoreResult<Vec<AnchorRecord>> {
        let state = self.read()?;
        let limit = filter.limit.unwrap_or(usize::MAX);

        // Fingerprint-filtered queries use the index instead of a full scan.
        if let Some(fp) = filter.fingerprint {
            let Some(ids) = state.by_fingerprint.get(&fp) else {
                return Ok(vec![]);
            };
            return Ok(ids
                .iter()
                .filter_map(|id| state.records.get(id))
                .filter(|r| filter.matches(r))
                .take(limit)
                .cloned()
                .collect());
        }

        Ok(state
            .ordered()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_many(&self, ids: &[ArtifactId]) -> StoreResult<Vec<AnchorRecord>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id))
            .cloned()
            .collect())
    }

    fn find_by_fingerprints(&self, fingerprints: &[Fingerprint]) -> StoreResult<Vec<AnchorRecord>> {
        let state = self.read()?;
        let wanted: HashSet<&ArtifactId> = fingerprints
            .iter()
            .filter_map(|fp| state.by_fingerprint.get(fp))
            .flatten()
            .collect();
        Ok(state
            .ordered()
            .filter(|r| wanted.contains(&r.artifact_id))
            .cloned()
            .collect())
    }

    fn count(&self, status: AnchorStatus) -> StoreResult<usize> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|r| r.status == status)
            .count())
    }

    fn claim_unanchored(&self, attempt: AttemptId, limit: usize) -> StoreResult<Vec<AnchorRecord>> {
        let mut state = self.write()?;
        let selected: Vec<ArtifactId> = state
            .ordered()
            .filter(|r| r.status == AnchorStatus::Unanchored)
            .take(limit)
            .map(|r| r.artifact_id.clone())
            .collect();

        let mut claimed = Vec::with_capacity(selected.len());
        for id in selected {
            if let Some(record) = state.records.get_mut(&id) {
                record.status = AnchorStatus::Claimed;
                record.claim = Some(attempt);
                claimed.push(record.clone());
            }
        }
        debug!(attempt = %attempt, count = claimed.len(), "claimed unanchored records");
        Ok(claimed)
    }

    fn complete_claim(&self, attempt: AttemptId, commit: &ClaimCommit) -> StoreResult<usize> {
        let mut state = self.write()?;

        for (id, _) in &commit.proofs {
            let record = state
                .records
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if record.status != AnchorStatus::Claimed || record.claim != Some(attempt) {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from: record.status,
                    to: AnchorStatus::Anchored,
                });
            }
        }

        for (id, proof) in &commit.proofs {
            if let Some(record) = state.records.get_mut(id) {
                record.status = AnchorStatus::Anchored;
                record.claim = None;
                record.batch_id = Some(commit.batch_id.clone());
                record.merkle_root = Some(commit.root);
                record.proof = Some(proof.clone());
                record.tx_ref = Some(commit.tx_ref.clone());
                record.anchored_at = Some(commit.anchored_at);
            }
        }
        Ok(commit.proofs.len())
    }

    fn release_claim(&self, attempt: AttemptId) -> StoreResult<usize> {
        let mut state = self.write()?;
        let mut released = 0;
        for record in state.records.values_mut() {
            if record.status == AnchorStatus::Claimed && record.claim == Some(attempt) {
                record.status = AnchorStatus::Unanchored;
                record.claim = None;
                released += 1;
            }
        }
        Ok(released)
    }

    fn mark_revoked(
        &self,
        id: &ArtifactId,
        revoked_at: DateTime<Utc>,
        tx_ref: Option<TxRef>,
    ) -> StoreResult<AnchorRecord> {
        let mut state = self.write()?;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        match record.status {
            AnchorStatus::Revoked => {}
            AnchorStatus::Anchored => {
                record.status = AnchorStatus::Revoked;
                record.revoked_at = Some(revoked_at);
                record.revocation_tx = tx_ref;
            }
            from => {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from,
                    to: AnchorStatus::Revoked,
                })
            }
        }
        Ok(record.clone())
    }
}

impl BatchStore for InMemoryRecordStore {
    fn insert_batch(&self, batch: Batch) -> StoreResult<()> {
        self.write()?.batches.insert(batch.attempt_id, batch);
        Ok(())
    }

    fn get_batch(&self, attempt: AttemptId) -> StoreResult<Option<Batch>> {
        Ok(self.read()?.batches.get(&attempt).cloned())
    }

    fn update_batch(&self, batch: &Batch) -> StoreResult<()> {
        let mut state = self.write()?;
        let existing = state
            .batches
            .get_mut(&batch.attempt_id)
            .ok_or(StoreError::BatchNotFound(batch.attempt_id))?;
        if existing.status == BatchStatus::Anchored {
            return Err(StoreError::BatchImmutable(batch.attempt_id));
        }
        *existing = batch.clone();
        Ok(())
    }

    fn pending_batches(&self) -> StoreResult<Vec<Batch>> {
        Ok(self
            .read()?
            .batches
            .values()
            .filter(|b| b.status == BatchStatus::Pending)
            .cloned()
            .collect())
    }

    fn last_anchored_batch(&self) -> StoreResult<Option<Batch>> {
        Ok(self
            .read()?
            .batches
            .values()
            .filter(|b| b.status == BatchStatus::Anchored)
            .max_by_key(|b| (b.anchored_at, b.attempt_id))
            .cloned())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
