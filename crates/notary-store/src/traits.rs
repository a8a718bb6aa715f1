use chrono::{DateTime, Utc};

use notary_types::{
    AnchorRecord, AnchorStatus, ArtifactId, AttemptId, Batch, Fingerprint, TxRef,
};

use crate::error::StoreResult;
use crate::filter::{ClaimCommit, RecordFilter};

/// Persisted anchor records, one per issued artifact.
///
/// All implementations must satisfy these invariants:
/// - `find` returns records in issue order (oldest first), so claim selection
///   is deterministic.
/// - `claim_unanchored` selects and marks in one atomic step: two concurrent
///   callers never receive the same record.
/// - `complete_claim` and `release_claim` only act on records still claimed by
///   the given attempt.
pub trait RecordStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateArtifact` if the id exists.
    fn insert(&self, record: AnchorRecord) -> StoreResult<()>;

    /// Read a record by artifact id.
    fn get(&self, id: &ArtifactId) -> StoreResult<Option<AnchorRecord>>;

    /// Records matching `filter`, in issue order, honouring `filter.limit`.
    fn find(&self, filter: &RecordFilter) -> StoreResult<Vec<AnchorRecord>>;

    /// First record matching `filter` in issue order.
    fn find_one(&self, filter: &RecordFilter) -> StoreResult<Option<AnchorRecord>> {
        let limited = filter.clone().with_limit(1);
        Ok(self.find(&limited)?.into_iter().next())
    }

    /// Bulk read by artifact id. Missing ids are skipped.
    fn get_many(&self, ids: &[ArtifactId]) -> StoreResult<Vec<AnchorRecord>>;

    /// Bulk read of every record whose fingerprint is in `fingerprints`,
    /// in issue order.
    fn find_by_fingerprints(&self, fingerprints: &[Fingerprint]) -> StoreResult<Vec<AnchorRecord>>;

    /// Number of records in `status`.
    fn count(&self, status: AnchorStatus) -> StoreResult<usize>;

    /// Atomically claim up to `limit` unanchored records for `attempt`,
    /// oldest first, and return them in that order.
    fn claim_unanchored(&self, attempt: AttemptId, limit: usize) -> StoreResult<Vec<AnchorRecord>>;

    /// Mark every record claimed by `attempt` as anchored with its proof.
    ///
    /// All-or-nothing: if any listed record is no longer claimed by `attempt`
    /// nothing is written. Returns the number of records anchored.
    fn complete_claim(&self, attempt: AttemptId, commit: &ClaimCommit) -> StoreResult<usize>;

    /// Return every record claimed by `attempt` to `Unanchored`.
    fn release_claim(&self, attempt: AttemptId) -> StoreResult<usize>;

    /// Mark an anchored record revoked. Revoking a revoked record is a no-op
    /// that returns the stored record unchanged. `tx_ref` is `None` when the
    /// ledger already held the revocation.
    fn mark_revoked(
        &self,
        id: &ArtifactId,
        revoked_at: DateTime<Utc>,
        tx_ref: Option<TxRef>,
    ) -> StoreResult<AnchorRecord>;
}

/// Persisted batch attempts.
pub trait BatchStore: Send + Sync {
    /// Persist a new attempt (normally `Pending`).
    fn insert_batch(&self, batch: Batch) -> StoreResult<()>;

    /// Read an attempt.
    fn get_batch(&self, attempt: AttemptId) -> StoreResult<Option<Batch>>;

    /// Replace an attempt. Fails with `BatchImmutable` once it is anchored.
    fn update_batch(&self, batch: &Batch) -> StoreResult<()>;

    /// Attempts still awaiting a ledger result, oldest first.
    fn pending_batches(&self) -> StoreResult<Vec<Batch>>;

    /// Most recently anchored attempt.
    fn last_anchored_batch(&self) -> StoreResult<Option<Batch>>;
}

/// A backend that holds both records and batches.
pub trait AnchorStore: RecordStore + BatchStore {}

impl<T: RecordStore + BatchStore + ?Sized> AnchorStore for T {}
