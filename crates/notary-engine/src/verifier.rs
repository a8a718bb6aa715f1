use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use notary_crypto::{fingerprint, verify_proof};
use notary_ledger::{CommitmentLedger, LedgerError};
use notary_store::{AnchorStore, RecordFilter, RecordStore};
use notary_types::{
    AnchorRecord, AnchorStatus, ArtifactId, BatchId, DetachedProof, Fingerprint, NodeHash,
    ProofBundle, TxRef,
};

use crate::error::EngineResult;

/// Prefix of every reason produced when the ledger could not be consulted.
pub const LEDGER_UNAVAILABLE: &str = "blockchain verification unavailable";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    NotVerified,
    Revoked,
    NotFound,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verified => "VERIFIED",
            Self::NotVerified => "NOT_VERIFIED",
            Self::Revoked => "REVOKED",
            Self::NotFound => "NOT_FOUND",
        };
        f.write_str(s)
    }
}

/// What the ledger cross-check concluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerCheck {
    /// Ledger holds the expected root.
    Confirmed,
    /// Ledger holds a different root, or none, for the batch.
    Mismatch,
    /// Ledger could not be reached.
    Unavailable,
    /// Ledger was not consulted.
    Skipped,
}

/// Outcome of verifying one artifact or proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub reason: String,
    pub ledger: LedgerCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<TxRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl VerificationResult {
    fn new(status: VerificationStatus, ledger: LedgerCheck, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            ledger,
            artifact_id: None,
            fingerprint: None,
            batch_id: None,
            tx_ref: None,
            anchored_at: None,
            revoked_at: None,
        }
    }

    pub(crate) fn not_found(reason: impl Into<String>) -> Self {
        Self::new(VerificationStatus::NotFound, LedgerCheck::Skipped, reason)
    }

    /// Result for input that could not be read as proof material at all.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(VerificationStatus::NotVerified, LedgerCheck::Skipped, reason)
    }

    pub(crate) fn for_record(mut self, record: &AnchorRecord) -> Self {
        self.artifact_id = Some(record.artifact_id.clone());
        self.fingerprint = Some(record.fingerprint);
        self.batch_id = record.batch_id.clone();
        self.tx_ref = record.tx_ref.clone();
        self.anchored_at = record.anchored_at;
        self.revoked_at = record.revoked_at;
        self
    }

    pub(crate) fn with_fingerprint(mut self, fp: Fingerprint) -> Self {
        self.fingerprint = Some(fp);
        self
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}

/// Proof material to check, taken from a record or supplied by a caller.
struct Claim<'a> {
    fingerprint: Fingerprint,
    root: NodeHash,
    proof: &'a [NodeHash],
    batch_id: Option<&'a BatchId>,
    locally_revoked: bool,
}

/// Read-only verification against stored proofs and the ledger.
///
/// Nothing is cached: every call recomputes the root from the proof,
/// re-reads the ledger root and re-checks revocation.
#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn AnchorStore>,
    ledger: Arc<dyn CommitmentLedger>,
    max_concurrency: usize,
}

impl Verifier {
    pub fn new(
        store: Arc<dyn AnchorStore>,
        ledger: Arc<dyn CommitmentLedger>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Verify the stored record for `id`.
    pub async fn verify_id(&self, id: &ArtifactId) -> EngineResult<VerificationResult> {
        match self.store.get(id)? {
            Some(record) => Ok(self.verify_record(&record).await),
            None => Ok(VerificationResult::not_found(format!(
                "no record for artifact {id}"
            ))),
        }
    }

    /// Fingerprint `bytes` and verify the record they belong to.
    pub async fn verify_bytes(&self, bytes: &[u8]) -> EngineResult<VerificationResult> {
        let fp = fingerprint(bytes);
        let records = self.store.find(&RecordFilter::fingerprint(fp))?;
        Ok(self.verify_candidates(fp, &records).await)
    }

    /// Verify caller-supplied proof material with no persisted state.
    ///
    /// The ledger is consulted only when a batch id is supplied.
    pub async fn verify_detached(&self, proof: &DetachedProof) -> VerificationResult {
        let claim = Claim {
            fingerprint: proof.fingerprint,
            root: proof.root,
            proof: &proof.proof,
            batch_id: proof.batch_id.as_ref(),
            locally_revoked: false,
        };
        let mut result = self.check(claim).await.with_fingerprint(proof.fingerprint);
        result.batch_id = proof.batch_id.clone();
        result
    }

    pub async fn verify_bundle(&self, bundle: &ProofBundle) -> VerificationResult {
        let mut result = self.verify_detached(&DetachedProof::from(bundle.clone())).await;
        result.tx_ref = Some(bundle.tx_ref.clone());
        result
    }

    /// Verify many artifacts by id with one store read. Results follow input
    /// order.
    pub async fn verify_many(&self, ids: &[ArtifactId]) -> EngineResult<Vec<VerificationResult>> {
        let records: HashMap<ArtifactId, AnchorRecord> = self
            .store
            .get_many(ids)?
            .into_iter()
            .map(|r| (r.artifact_id.clone(), r))
            .collect();

        let results: Vec<VerificationResult> = stream::iter(ids.iter().cloned())
            .map(|id| {
                let record = records.get(&id).cloned();
                async move {
                    match record {
                        Some(record) => self.verify_record(&record).await,
                        None => VerificationResult::not_found(format!("no record for artifact {id}")),
                    }
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;
        Ok(results)
    }

    /// Verify many artifacts by content with one store read. Results follow
    /// input order.
    pub async fn verify_many_bytes<B: AsRef<[u8]> + Sync>(
        &self,
        artifacts: &[B],
    ) -> EngineResult<Vec<VerificationResult>> {
        let fingerprints: Vec<Fingerprint> =
            artifacts.iter().map(|a| fingerprint(a.as_ref())).collect();

        let mut by_fingerprint: HashMap<Fingerprint, Vec<AnchorRecord>> = HashMap::new();
        for record in self.store.find_by_fingerprints(&fingerprints)? {
            by_fingerprint.entry(record.fingerprint).or_default().push(record);
        }

        let results: Vec<VerificationResult> = stream::iter(fingerprints)
            .map(|fp| {
                let candidates = by_fingerprint.get(&fp).cloned().unwrap_or_default();
                async move { self.verify_candidates(fp, &candidates).await }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;
        Ok(results)
    }

    /// Verify one stored record.
    pub async fn verify_record(&self, record: &AnchorRecord) -> VerificationResult {
        if !record.status.has_proof() {
            return VerificationResult::new(
                VerificationStatus::NotVerified,
                LedgerCheck::Skipped,
                format!("artifact not yet anchored (status {})", record.status),
            )
            .for_record(record);
        }

        let (Some(root), Some(proof), Some(batch_id)) =
            (record.merkle_root, record.proof.as_deref(), record.batch_id.as_ref())
        else {
            warn!(artifact = %record.artifact_id, "anchored record is missing proof fields");
            return VerificationResult::new(
                VerificationStatus::NotVerified,
                LedgerCheck::Skipped,
                "record is marked anchored but carries no complete proof",
            )
            .for_record(record);
        };

        let claim = Claim {
            fingerprint: record.fingerprint,
            root,
            proof,
            batch_id: Some(batch_id),
            locally_revoked: record.status == AnchorStatus::Revoked,
        };
        self.check(claim).await.for_record(record)
    }

    /// Several records may share a fingerprint. The first one carrying a
    /// proof wins, in issue order.
    async fn verify_candidates(&self, fp: Fingerprint, records: &[AnchorRecord]) -> VerificationResult {
        let chosen = records
            .iter()
            .find(|r| r.status.has_proof())
            .or_else(|| records.first());
        match chosen {
            Some(record) => self.verify_record(record).await,
            None => VerificationResult::not_found(format!(
                "no artifact with fingerprint {fp}"
            ))
            .with_fingerprint(fp),
        }
    }

    async fn check(&self, claim: Claim<'_>) -> VerificationResult {
        use VerificationStatus::*;

        if !verify_proof(&claim.fingerprint, claim.proof, &claim.root) {
            return VerificationResult::new(
                NotVerified,
                LedgerCheck::Skipped,
                "inclusion proof does not lead to the recorded root",
            );
        }

        let Some(batch_id) = claim.batch_id else {
            return VerificationResult::new(
                Verified,
                LedgerCheck::Skipped,
                "inclusion proof valid; no batch id supplied so the ledger was not consulted",
            );
        };

        match self.ledger.get_root(batch_id).await {
            Ok(Some(on_ledger)) if on_ledger == claim.root => {}
            Ok(Some(_)) => {
                return VerificationResult::new(
                    NotVerified,
                    LedgerCheck::Mismatch,
                    format!("ledger root for batch {batch_id} does not match"),
                )
            }
            Ok(None) => {
                return VerificationResult::new(
                    NotVerified,
                    LedgerCheck::Mismatch,
                    format!("ledger has no root for batch {batch_id}"),
                )
            }
            Err(e) => return unavailable(&claim, &e),
        }

        match self.ledger.is_revoked(claim.fingerprint).await {
            Ok(true) => VerificationResult::new(
                Revoked,
                LedgerCheck::Confirmed,
                "fingerprint is revoked on the ledger",
            ),
            Ok(false) if claim.locally_revoked => VerificationResult::new(
                Revoked,
                LedgerCheck::Confirmed,
                "artifact is revoked locally; ledger shows no revocation",
            ),
            Ok(false) => {
                debug!(fingerprint = %claim.fingerprint.short_hex(), batch_id = %batch_id, "verified");
                VerificationResult::new(
                    Verified,
                    LedgerCheck::Confirmed,
                    "inclusion proof valid and root confirmed on the ledger",
                )
            }
            Err(e) => unavailable(&claim, &e),
        }
    }
}

fn unavailable(claim: &Claim<'_>, err: &LedgerError) -> VerificationResult {
    warn!(error = %err, "ledger unavailable during verification");
    let status = if claim.locally_revoked {
        VerificationStatus::Revoked
    } else {
        VerificationStatus::NotVerified
    };
    VerificationResult::new(status, LedgerCheck::Unavailable, format!("{LEDGER_UNAVAILABLE}: {err}"))
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("ledger", &self.ledger.name())
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use notary_ledger::{GuardedLedger, InMemoryLedger, LedgerFault};
    use notary_store::InMemoryRecordStore;
    use notary_types::ArtifactKind;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryRecordStore>,
        ledger: Arc<InMemoryLedger>,
        scheduler: Scheduler,
        verifier: Verifier,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        Fixture {
            scheduler: Scheduler::new(store.clone(), ledger.clone(), 100, Duration::from_secs(60)),
            verifier: Verifier::new(store.clone(), ledger.clone(), 4),
            store,
            ledger,
        }
    }

    impl Fixture {
        fn issue(&self, id: &str, bytes: &[u8]) {
            self.store
                .insert(AnchorRecord::unanchored(
                    ArtifactId::new(id),
                    ArtifactKind::Certificate,
                    fingerprint(bytes),
                    Utc::now(),
                ))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let f = fixture();
        let result = f.verifier.verify_id(&ArtifactId::new("nope")).await.unwrap();
        assert_eq!(result.status, VerificationStatus::NotFound);
        assert_eq!(result.ledger, LedgerCheck::Skipped);
    }

    #[tokio::test]
    async fn unanchored_is_not_verified() {
        let f = fixture();
        f.issue("a", b"a");
        let result = f.verifier.verify_id(&ArtifactId::new("a")).await.unwrap();
        assert_eq!(result.status, VerificationStatus::NotVerified);
        assert!(result.reason.contains("not yet anchored"));
    }

    #[tokio::test]
    async fn anchored_record_verifies() {
        let f = fixture();
        f.issue("a", b"a");
        f.issue("b", b"b");
        f.scheduler.trigger().await.unwrap();

        let result = f.verifier.verify_id(&ArtifactId::new("a")).await.unwrap();
        assert_eq!(result.status, VerificationStatus::Verified, "{}", result.reason);
        assert_eq!(result.ledger, LedgerCheck::Confirmed);
        assert_eq!(result.batch_id, Some(BatchId::new("1")));

        let by_bytes = f.verifier.verify_bytes(b"b").await.unwrap();
        assert!(by_bytes.is_verified());
        assert_eq!(by_bytes.artifact_id, Some(ArtifactId::new("b")));

        let unknown = f.verifier.verify_bytes(b"zzz").await.unwrap();
        assert_eq!(unknown.status, VerificationStatus::NotFound);
    }

    #[tokio::test]
    async fn tampered_proof_is_not_verified() {
        let f = fixture();
        f.issue("a", b"a");
        f.issue("b", b"b");
        f.scheduler.trigger().await.unwrap();

        let mut record = f.store.get(&ArtifactId::new("a")).unwrap().unwrap();
        record.proof = Some(vec![NodeHash::from_hash([0; 32])]);
        let result = f.verifier.verify_record(&record).await;
        assert_eq!(result.status, VerificationStatus::NotVerified);
        assert_eq!(result.ledger, LedgerCheck::Skipped);
    }

    #[tokio::test]
    async fn ledger_root_mismatch_is_not_verified() {
        let f = fixture();
        f.issue("a", b"a");
        f.scheduler.trigger().await.unwrap();

        let mut record = f.store.get(&ArtifactId::new("a")).unwrap().unwrap();
        record.batch_id = Some(BatchId::new("42"));
        let result = f.verifier.verify_record(&record).await;
        assert_eq!(result.status, VerificationStatus::NotVerified);
        assert_eq!(result.ledger, LedgerCheck::Mismatch);
    }

    #[tokio::test]
    async fn ledger_revocation_wins() {
        let f = fixture();
        f.issue("a", b"a");
        f.scheduler.trigger().await.unwrap();
        f.ledger.revoke(fingerprint(b"a")).await.unwrap();

        let result = f.verifier.verify_id(&ArtifactId::new("a")).await.unwrap();
        assert_eq!(result.status, VerificationStatus::Revoked);
    }

    #[tokio::test]
    async fn ledger_outage_reports_unavailable() {
        let f = fixture();
        f.issue("a", b"a");
        f.scheduler.trigger().await.unwrap();
        f.ledger.set_fault(Some(LedgerFault::Unavailable));

        let result = f.verifier.verify_id(&ArtifactId::new("a")).await.unwrap();
        assert_eq!(result.status, VerificationStatus::NotVerified);
        assert_eq!(result.ledger, LedgerCheck::Unavailable);
        assert!(result.reason.starts_with(LEDGER_UNAVAILABLE));
    }

    #[tokio::test]
    async fn detached_proof_without_batch_skips_ledger() {
        let f = fixture();
        f.ledger.set_fault(Some(LedgerFault::Unavailable));
        let leaf = fingerprint(b"x");
        let proof = DetachedProof {
            fingerprint: leaf,
            root: leaf,
            proof: vec![],
            batch_id: None,
        };
        let result = f.verifier.verify_detached(&proof).await;
        assert_eq!(result.status, VerificationStatus::Verified);
        assert_eq!(result.ledger, LedgerCheck::Skipped);

        let bad = DetachedProof {
            root: fingerprint(b"y"),
            ..proof
        };
        assert_eq!(
            f.verifier.verify_detached(&bad).await.status,
            VerificationStatus::NotVerified
        );
    }

    #[tokio::test]
    async fn bulk_preserves_input_order() {
        let f = fixture();
        for id in ["a", "b", "c"] {
            f.issue(id, id.as_bytes());
        }
        f.scheduler.trigger().await.unwrap();
        f.issue("d", b"d");

        let ids: Vec<ArtifactId> = ["c", "missing", "d", "a"].into_iter().map(ArtifactId::new).collect();
        let results = f.verifier.verify_many(&ids).await.unwrap();
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                VerificationStatus::Verified,
                VerificationStatus::NotFound,
                VerificationStatus::NotVerified,
                VerificationStatus::Verified,
            ]
        );
        assert_eq!(results[0].artifact_id, Some(ArtifactId::new("c")));

        let by_bytes = f
            .verifier
            .verify_many_bytes(&[b"b".to_vec(), b"q".to_vec()])
            .await
            .unwrap();
        assert!(by_bytes[0].is_verified());
        assert_eq!(by_bytes[1].status, VerificationStatus::NotFound);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn bulk_futures_are_send() {
        let f = fixture();
        let ids = vec![ArtifactId::new("a")];
        let by_id = f.verifier.verify_many(&ids);
        assert_send(&by_id);
        let artifacts = vec![b"a".to_vec()];
        let by_bytes = f.verifier.verify_many_bytes(&artifacts);
        assert_send(&by_bytes);
    }

    #[tokio::test]
    async fn stalled_ledger_behind_guard_reports_unavailable() {
        let f = fixture();
        f.issue("a", b"a");
        f.scheduler.trigger().await.unwrap();

        let guarded = Arc::new(GuardedLedger::new(f.ledger.clone(), Duration::from_millis(50)));
        let verifier = Verifier::new(f.store.clone(), guarded, 4);
        f.ledger.set_fault(Some(LedgerFault::Stall));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            verifier.verify_id(&ArtifactId::new("a")),
        )
        .await
        .expect("guard bounds the ledger call")
        .unwrap();
        assert_eq!(result.status, VerificationStatus::NotVerified);
        assert_eq!(result.ledger, LedgerCheck::Unavailable);
        assert!(result.reason.starts_with("blockchain verification unavailable"));

        let bulk = verifier
            .verify_many(&[ArtifactId::new("a"), ArtifactId::new("b")])
            .await
            .unwrap();
        assert_eq!(bulk[0].ledger, LedgerCheck::Unavailable);
        assert_eq!(bulk[1].status, VerificationStatus::NotFound);
    }

    #[test]
    fn result_serializes_screaming_status() {
        let result = VerificationResult::not_found("gone");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "NOT_FOUND");
        assert_eq!(json["ledger"], "skipped");
        assert!(json.get("artifact_id").is_none());
    }
}
