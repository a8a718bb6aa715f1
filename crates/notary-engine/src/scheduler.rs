use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use notary_crypto::MerkleTree;
use notary_ledger::CommitmentLedger;
use notary_store::{AnchorStore, BatchStore, ClaimCommit, RecordFilter, RecordStore};
use notary_types::{
    AnchorRecord, AnchorStatus, AttemptId, Batch, BatchId, BatchStatus, NodeHash, TxRef,
};

use crate::error::{EngineError, EngineResult};

/// Result of one anchoring run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing to anchor. The ledger was not called.
    Idle,
    /// Root published and every claimed record anchored.
    Anchored {
        attempt_id: AttemptId,
        batch_id: BatchId,
        root: NodeHash,
        tx_ref: TxRef,
        leaf_count: usize,
    },
    /// Publish failed before any ledger write. Records were released and
    /// will be retried under a fresh attempt.
    Skipped {
        attempt_id: AttemptId,
        leaf_count: usize,
        reason: String,
    },
    /// Publish may have landed. Records stay claimed until reconciled.
    Unconfirmed {
        attempt_id: AttemptId,
        root: NodeHash,
        leaf_count: usize,
        reason: String,
    },
}

/// Operator decision for an unconfirmed attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    /// The ledger did record the root under `batch_id`.
    Published { batch_id: BatchId, tx_ref: TxRef },
    /// The ledger never recorded the root.
    NotPublished,
}

/// Periodic batch anchoring.
///
/// Each run claims up to `batch_size` UNANCHORED records, builds a Merkle
/// tree over their fingerprints, persists a PENDING attempt, and calls
/// `publish` exactly once. Runs in this process are serialized by a run
/// lock; runs in other processes are kept apart by the store's atomic claim.
pub struct Scheduler {
    store: Arc<dyn AnchorStore>,
    ledger: Arc<dyn CommitmentLedger>,
    batch_size: usize,
    interval: Duration,
    run_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn AnchorStore>,
        ledger: Arc<dyn CommitmentLedger>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            batch_size,
            interval,
            run_lock: Mutex::new(()),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run one anchoring cycle now and report what happened.
    pub async fn trigger(&self) -> EngineResult<RunOutcome> {
        let _running = self.run_lock.lock().await;
        self.run_once().await
    }

    /// Start the background loop. It stops when `shutdown` flips to `true`
    /// or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; wait a full interval.
            ticker.tick().await;
            info!(
                interval_secs = self.interval.as_secs(),
                batch_size = self.batch_size,
                "anchoring scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.trigger().await {
                            Ok(RunOutcome::Idle) => debug!("anchoring run idle"),
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "anchoring run failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("anchoring scheduler stopped");
        })
    }

    /// Attempts still awaiting a ledger result.
    pub fn pending_attempts(&self) -> EngineResult<Vec<Batch>> {
        Ok(self.store.pending_batches()?)
    }

    /// Resolve an attempt left unconfirmed by a failed publish.
    ///
    /// `Published` is only accepted if the ledger holds the attempt's root
    /// under the given batch id.
    pub async fn reconcile(&self, attempt: AttemptId, resolution: Resolution) -> EngineResult<Batch> {
        let _running = self.run_lock.lock().await;

        let Some(mut batch) = self.store.get_batch(attempt)? else {
            return self.reconcile_orphan(attempt, resolution);
        };
        if batch.status != BatchStatus::Pending {
            return Err(EngineError::AttemptResolved {
                attempt,
                status: batch.status,
            });
        }

        match resolution {
            Resolution::NotPublished => {
                let released = self.store.release_claim(attempt)?;
                batch.status = BatchStatus::Failed;
                batch.failure = Some("operator confirmed root was not published".into());
                self.store.update_batch(&batch)?;
                info!(attempt = %attempt, released, "attempt reconciled as not published");
            }
            Resolution::Published { batch_id, tx_ref } => {
                let on_ledger = self.ledger.get_root(&batch_id).await?;
                if on_ledger != Some(batch.root) {
                    return Err(EngineError::ReconcileMismatch { attempt, batch_id });
                }
                let claimed = self.store.find(&RecordFilter::claimed_by(attempt))?;
                let tree = MerkleTree::build(claimed.iter().map(|r| r.fingerprint).collect())?;
                if tree.root() != batch.root {
                    return Err(EngineError::ReconcileMismatch { attempt, batch_id });
                }
                let anchored = self.finalize(&mut batch, &tree, &claimed, batch_id, tx_ref)?;
                info!(attempt = %attempt, anchored, "attempt reconciled as published");
            }
        }
        Ok(batch)
    }

    /// Claims whose attempt row was never written, typically left by a
    /// process that stopped between claiming and recording the attempt.
    /// Runs in this process are excluded; runs in other processes may
    /// briefly show up here while they are preparing.
    pub async fn orphaned_attempts(&self) -> EngineResult<Vec<AttemptId>> {
        let _running = self.run_lock.lock().await;
        let claimed = self.store.find(&RecordFilter::status(AnchorStatus::Claimed))?;
        let mut orphans = BTreeSet::new();
        for attempt in claimed.iter().filter_map(|r| r.claim) {
            if !orphans.contains(&attempt) && self.store.get_batch(attempt)?.is_none() {
                orphans.insert(attempt);
            }
        }
        Ok(orphans.into_iter().collect())
    }

    /// An orphaned claim never reached `publish`, so the only valid outcome
    /// is releasing it. The attempt is recorded as FAILED for the audit trail.
    fn reconcile_orphan(&self, attempt: AttemptId, resolution: Resolution) -> EngineResult<Batch> {
        let claimed = self.store.find(&RecordFilter::claimed_by(attempt))?;
        if claimed.is_empty() {
            return Err(EngineError::UnknownAttempt(attempt));
        }
        if let Resolution::Published { batch_id, .. } = resolution {
            return Err(EngineError::ReconcileMismatch { attempt, batch_id });
        }

        let tree = MerkleTree::build(claimed.iter().map(|r| r.fingerprint).collect())?;
        let mut batch = Batch::pending(attempt, tree.root(), claimed.len());
        batch.status = BatchStatus::Failed;
        batch.failure = Some("claim orphaned before the attempt was recorded".into());
        self.store.insert_batch(batch.clone())?;
        let released = self.store.release_claim(attempt)?;
        warn!(attempt = %attempt, released, "orphaned claim released");
        Ok(batch)
    }

    async fn run_once(&self) -> EngineResult<RunOutcome> {
        let attempt = AttemptId::new();
        let claimed = self.store.claim_unanchored(attempt, self.batch_size)?;
        if claimed.is_empty() {
            return Ok(RunOutcome::Idle);
        }
        let leaf_count = claimed.len();

        let prepared = MerkleTree::build(claimed.iter().map(|r| r.fingerprint).collect())
            .map_err(EngineError::from)
            .and_then(|tree| {
                let batch = Batch::pending(attempt, tree.root(), leaf_count);
                self.store.insert_batch(batch.clone())?;
                Ok((tree, batch))
            });
        let (tree, mut batch) = match prepared {
            Ok(p) => p,
            Err(e) => {
                self.store.release_claim(attempt)?;
                return Err(e);
            }
        };
        let root = tree.root();

        debug!(attempt = %attempt, leaf_count, root = %root, "publishing batch root");
        match self.ledger.publish(root).await {
            Ok(receipt) => {
                let batch_id = receipt.batch_id.clone();
                let tx_ref = receipt.tx_ref.clone();
                self.finalize(&mut batch, &tree, &claimed, receipt.batch_id, receipt.tx_ref)
                    .inspect_err(|e| {
                        error!(
                            attempt = %attempt,
                            batch_id = %batch_id,
                            error = %e,
                            "root published but records not updated; reconcile this attempt"
                        )
                    })?;
                info!(
                    attempt = %attempt,
                    batch_id = %batch_id,
                    tx_ref = %tx_ref,
                    leaf_count,
                    root = %root.short_hex(),
                    "batch anchored"
                );
                Ok(RunOutcome::Anchored {
                    attempt_id: attempt,
                    batch_id,
                    root,
                    tx_ref,
                    leaf_count,
                })
            }
            Err(e) if e.is_unconfirmed() => {
                error!(
                    attempt = %attempt,
                    root = %root,
                    leaf_count,
                    error = %e,
                    "publish unconfirmed; records held until the attempt is reconciled"
                );
                Ok(RunOutcome::Unconfirmed {
                    attempt_id: attempt,
                    root,
                    leaf_count,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                self.store.release_claim(attempt)?;
                batch.status = BatchStatus::Failed;
                batch.failure = Some(e.to_string());
                self.store.update_batch(&batch)?;
                warn!(attempt = %attempt, leaf_count, error = %e, "ledger publish failed; cycle skipped");
                Ok(RunOutcome::Skipped {
                    attempt_id: attempt,
                    leaf_count,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write proofs to every claimed record, then mark the attempt anchored.
    fn finalize(
        &self,
        batch: &mut Batch,
        tree: &MerkleTree,
        claimed: &[AnchorRecord],
        batch_id: BatchId,
        tx_ref: TxRef,
    ) -> EngineResult<usize> {
        let anchored_at = Utc::now();
        let proofs = claimed
            .iter()
            .filter_map(|r| {
                tree.proof_for(&r.fingerprint)
                    .map(|proof| (r.artifact_id.clone(), proof))
            })
            .collect();
        let commit = ClaimCommit {
            batch_id: batch_id.clone(),
            root: tree.root(),
            tx_ref: tx_ref.clone(),
            anchored_at,
            proofs,
        };
        let anchored = self.store.complete_claim(batch.attempt_id, &commit)?;

        batch.status = BatchStatus::Anchored;
        batch.batch_id = Some(batch_id);
        batch.tx_ref = Some(tx_ref);
        batch.anchored_at = Some(anchored_at);
        batch.failure = None;
        self.store.update_batch(batch)?;
        Ok(anchored)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("ledger", &self.ledger.name())
            .field("batch_size", &self.batch_size)
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_crypto::{fingerprint, verify_proof};
    use notary_ledger::{InMemoryLedger, LedgerFault};
    use notary_store::InMemoryRecordStore;
    use notary_types::{AnchorStatus, ArtifactId, ArtifactKind};

    fn setup(n: usize, batch_size: usize) -> (Scheduler, Arc<InMemoryRecordStore>, Arc<InMemoryLedger>) {
        let store = Arc::new(InMemoryRecordStore::new());
        for i in 0..n {
            let id = format!("cert-{i}");
            store
                .insert(AnchorRecord::unanchored(
                    ArtifactId::new(id.clone()),
                    ArtifactKind::Certificate,
                    fingerprint(id.as_bytes()),
                    Utc::now(),
                ))
                .unwrap();
        }
        let ledger = Arc::new(InMemoryLedger::new());
        let scheduler = Scheduler::new(store.clone(), ledger.clone(), batch_size, Duration::from_secs(60));
        (scheduler, store, ledger)
    }

    #[tokio::test]
    async fn idle_run_does_not_touch_ledger() {
        let (scheduler, _, ledger) = setup(0, 10);
        assert_eq!(scheduler.trigger().await.unwrap(), RunOutcome::Idle);
        assert_eq!(ledger.publish_calls(), 0);
    }

    #[tokio::test]
    async fn successful_run_anchors_every_record() {
        let (scheduler, store, ledger) = setup(3, 10);
        let outcome = scheduler.trigger().await.unwrap();
        let RunOutcome::Anchored { root, leaf_count, batch_id, .. } = outcome else {
            panic!("expected anchored, got {outcome:?}");
        };
        assert_eq!(leaf_count, 3);
        assert_eq!(ledger.publish_calls(), 1);
        assert_eq!(ledger.get_root(&batch_id).await.unwrap(), Some(root));

        for r in store.find(&RecordFilter::default()).unwrap() {
            assert_eq!(r.status, AnchorStatus::Anchored);
            assert_eq!(r.merkle_root, Some(root));
            assert!(verify_proof(&r.fingerprint, r.proof.as_ref().unwrap(), &root));
        }
        let batch = store.last_anchored_batch().unwrap().unwrap();
        assert_eq!(batch.batch_id, Some(batch_id));
        assert!(scheduler.pending_attempts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_size_limits_claim() {
        let (scheduler, store, _) = setup(5, 2);
        scheduler.trigger().await.unwrap();
        assert_eq!(store.count(AnchorStatus::Anchored).unwrap(), 2);
        assert_eq!(store.count(AnchorStatus::Unanchored).unwrap(), 3);
        // Oldest first.
        assert!(store.get(&ArtifactId::new("cert-0")).unwrap().unwrap().is_anchored());
    }

    #[tokio::test]
    async fn unavailable_ledger_releases_records() {
        let (scheduler, store, ledger) = setup(2, 10);
        ledger.set_fault(Some(LedgerFault::Unavailable));

        let outcome = scheduler.trigger().await.unwrap();
        let RunOutcome::Skipped { attempt_id, .. } = outcome else {
            panic!("expected skipped, got {outcome:?}");
        };
        assert_eq!(store.count(AnchorStatus::Unanchored).unwrap(), 2);
        let batch = store.get_batch(attempt_id).unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert!(batch.failure.is_some());

        ledger.set_fault(None);
        let retry = scheduler.trigger().await.unwrap();
        let RunOutcome::Anchored { attempt_id: retry_attempt, .. } = retry else {
            panic!("expected anchored, got {retry:?}");
        };
        assert_ne!(retry_attempt, attempt_id);
    }

    #[tokio::test]
    async fn rejected_publish_is_skipped() {
        let (scheduler, store, ledger) = setup(1, 10);
        ledger.set_fault(Some(LedgerFault::Rejected));
        assert!(matches!(
            scheduler.trigger().await.unwrap(),
            RunOutcome::Skipped { .. }
        ));
        assert_eq!(store.count(AnchorStatus::Unanchored).unwrap(), 1);
    }

    #[tokio::test]
    async fn unconfirmed_publish_holds_claim() {
        let (scheduler, store, ledger) = setup(2, 10);
        ledger.set_fault(Some(LedgerFault::Unconfirmed));

        let outcome = scheduler.trigger().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Unconfirmed { .. }));
        assert_eq!(store.count(AnchorStatus::Claimed).unwrap(), 2);
        assert_eq!(scheduler.pending_attempts().unwrap().len(), 1);

        // A later run does not pick the held records up again.
        ledger.set_fault(None);
        assert_eq!(scheduler.trigger().await.unwrap(), RunOutcome::Idle);
        assert_eq!(ledger.publish_calls(), 1);
    }

    #[tokio::test]
    async fn reconcile_published_finalizes_records() {
        let (scheduler, store, ledger) = setup(3, 10);
        ledger.set_fault(Some(LedgerFault::Unconfirmed));
        let RunOutcome::Unconfirmed { attempt_id, .. } = scheduler.trigger().await.unwrap() else {
            panic!("expected unconfirmed");
        };
        ledger.set_fault(None);

        let (batch_id, _) = ledger.published_roots().remove(0);
        let batch = scheduler
            .reconcile(
                attempt_id,
                Resolution::Published {
                    batch_id: batch_id.clone(),
                    tx_ref: TxRef::new("0xabc"),
                },
            )
            .await
            .unwrap();
        assert_eq!(batch.status, BatchStatus::Anchored);
        assert_eq!(batch.batch_id, Some(batch_id));
        assert_eq!(store.count(AnchorStatus::Anchored).unwrap(), 3);
        assert!(scheduler.pending_attempts().unwrap().is_empty());

        let again = scheduler.reconcile(attempt_id, Resolution::NotPublished).await;
        assert!(matches!(again, Err(EngineError::AttemptResolved { .. })));
    }

    #[tokio::test]
    async fn reconcile_not_published_releases_records() {
        let (scheduler, store, ledger) = setup(2, 10);
        ledger.set_fault(Some(LedgerFault::Unconfirmed));
        let RunOutcome::Unconfirmed { attempt_id, .. } = scheduler.trigger().await.unwrap() else {
            panic!("expected unconfirmed");
        };
        ledger.set_fault(None);

        let batch = scheduler
            .reconcile(attempt_id, Resolution::NotPublished)
            .await
            .unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(store.count(AnchorStatus::Unanchored).unwrap(), 2);
    }

    #[tokio::test]
    async fn orphaned_claim_is_listed_and_released() {
        let (scheduler, store, ledger) = setup(3, 2);
        // A claim with no attempt row, as left by a crash mid-run.
        let orphan = AttemptId::new();
        assert_eq!(store.claim_unanchored(orphan, 2).unwrap().len(), 2);
        assert_eq!(scheduler.orphaned_attempts().await.unwrap(), vec![orphan]);

        let err = scheduler
            .reconcile(
                orphan,
                Resolution::Published {
                    batch_id: BatchId::new("1"),
                    tx_ref: TxRef::new("0x1"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReconcileMismatch { .. }));
        assert_eq!(store.count(AnchorStatus::Claimed).unwrap(), 2);

        let batch = scheduler.reconcile(orphan, Resolution::NotPublished).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.leaf_count, 2);
        assert_eq!(store.count(AnchorStatus::Claimed).unwrap(), 0);
        assert_eq!(store.count(AnchorStatus::Unanchored).unwrap(), 3);
        assert!(scheduler.orphaned_attempts().await.unwrap().is_empty());
        assert!(scheduler.pending_attempts().unwrap().is_empty());

        // A second resolution sees the FAILED row.
        let err = scheduler.reconcile(orphan, Resolution::NotPublished).await.unwrap_err();
        assert!(matches!(err, EngineError::AttemptResolved { .. }));

        scheduler.trigger().await.unwrap();
        scheduler.trigger().await.unwrap();
        assert_eq!(store.count(AnchorStatus::Anchored).unwrap(), 3);
        assert_eq!(ledger.publish_calls(), 2);
    }

    #[tokio::test]
    async fn unconfirmed_attempt_is_not_an_orphan() {
        let (scheduler, _, ledger) = setup(2, 10);
        ledger.set_fault(Some(LedgerFault::Unconfirmed));
        scheduler.trigger().await.unwrap();
        assert!(scheduler.orphaned_attempts().await.unwrap().is_empty());
        assert_eq!(scheduler.pending_attempts().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_rejects_wrong_batch() {
        let (scheduler, store, ledger) = setup(2, 10);
        ledger.publish(NodeHash::from_hash([0xEE; 32])).await.unwrap();
        ledger.set_fault(Some(LedgerFault::Unconfirmed));
        let RunOutcome::Unconfirmed { attempt_id, .. } = scheduler.trigger().await.unwrap() else {
            panic!("expected unconfirmed");
        };
        ledger.set_fault(None);

        let err = scheduler
            .reconcile(
                attempt_id,
                Resolution::Published {
                    batch_id: BatchId::new("1"),
                    tx_ref: TxRef::new("0x1"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReconcileMismatch { .. }));
        assert_eq!(store.count(AnchorStatus::Claimed).unwrap(), 2);

        let unknown = scheduler.reconcile(AttemptId::new(), Resolution::NotPublished).await;
        assert!(matches!(unknown, Err(EngineError::UnknownAttempt(_))));
    }

    #[tokio::test]
    async fn background_loop_anchors_and_stops() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .insert(AnchorRecord::unanchored(
                ArtifactId::new("late"),
                ArtifactKind::Document,
                fingerprint(b"late"),
                Utc::now(),
            ))
            .unwrap();
        let ledger = Arc::new(InMemoryLedger::new());
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            ledger.clone(),
            10,
            Duration::from_millis(20),
        ));

        let (tx, rx) = watch::channel(false);
        let handle = scheduler.spawn(rx);
        for _ in 0..100 {
            if store.count(AnchorStatus::Anchored).unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.count(AnchorStatus::Anchored).unwrap(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(RunOutcome::Idle).unwrap();
        assert_eq!(json["outcome"], "idle");
    }
}
