use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use notary_crypto::fingerprint;
use notary_ledger::CommitmentLedger;
use notary_store::{AnchorStore, ArtifactSource, RecordStore};
use notary_types::{
    AnchorRecord, ArtifactId, ArtifactKind, AttemptId, Batch, DetachedProof, ProofBundle,
};

use crate::anchorable::Anchorable;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::issuer::Issuer;
use crate::revocation::Revoker;
use crate::scheduler::{Resolution, RunOutcome, Scheduler};
use crate::stats::AnchoringStats;
use crate::verifier::{VerificationResult, Verifier};

/// High-level anchoring engine.
///
/// Owns the record store, the artifact source, the ledger client and the
/// services built on them. Construct with [`AnchorEngine::open`], call
/// [`start`](Self::start) to run the background scheduler, and
/// [`shutdown`](Self::shutdown) to stop it and close the ledger.
pub struct AnchorEngine {
    config: EngineConfig,
    store: Arc<dyn AnchorStore>,
    artifacts: Arc<dyn ArtifactSource>,
    ledger: Arc<dyn CommitmentLedger>,
    scheduler: Arc<Scheduler>,
    verifier: Verifier,
    issuer: Issuer,
    revoker: Revoker,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AnchorEngine {
    /// Build an engine, connecting to the ledger described by `config`.
    pub fn open(
        config: EngineConfig,
        store: Arc<dyn AnchorStore>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let ledger = notary_ledger::connect(&config.ledger)?;
        Self::with_ledger(config, store, artifacts, ledger)
    }

    /// Build an engine around an already constructed ledger client.
    pub fn with_ledger(
        config: EngineConfig,
        store: Arc<dyn AnchorStore>,
        artifacts: Arc<dyn ArtifactSource>,
        ledger: Arc<dyn CommitmentLedger>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            ledger.clone(),
            config.scheduler.batch_size,
            config.scheduler.interval(),
        ));
        let verifier = Verifier::new(
            store.clone(),
            ledger.clone(),
            config.verification.max_concurrency,
        );
        let issuer = Issuer::new(store.clone(), artifacts.clone());
        let revoker = Revoker::new(store.clone(), ledger.clone());
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            artifacts,
            ledger,
            scheduler,
            verifier,
            issuer,
            revoker,
            shutdown,
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger_name(&self) -> &'static str {
        self.ledger.name()
    }

    /// Start the background scheduler if it is enabled and not yet running.
    /// Returns `true` if a loop was started.
    pub fn start(&self) -> bool {
        if !self.config.scheduler.enabled {
            info!("background anchoring disabled; manual triggers only");
            return false;
        }
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return false;
        }
        *worker = Some(self.scheduler.clone().spawn(self.shutdown.subscribe()));
        true
    }

    /// Stop the background scheduler, wait for an in-progress run, and close
    /// the ledger client.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown.send_replace(true);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "scheduler task ended abnormally");
            }
        }
        self.ledger.close().await?;
        info!("anchor engine shut down");
        Ok(())
    }

    // ---- Issuance ----

    pub fn issue(&self, artifact: &dyn Anchorable) -> EngineResult<AnchorRecord> {
        self.issuer.issue(artifact)
    }

    pub fn issue_bytes(
        &self,
        id: ArtifactId,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> EngineResult<AnchorRecord> {
        self.issuer.issue_bytes(id, kind, bytes)
    }

    pub fn issue_stored(&self, id: ArtifactId, kind: ArtifactKind) -> EngineResult<AnchorRecord> {
        self.issuer.issue_stored(id, kind)
    }

    pub fn record(&self, id: &ArtifactId) -> EngineResult<Option<AnchorRecord>> {
        Ok(self.store.get(id)?)
    }

    // ---- Anchoring ----

    /// Run one anchoring cycle now.
    pub async fn trigger(&self) -> EngineResult<RunOutcome> {
        self.scheduler.trigger().await
    }

    pub fn pending_attempts(&self) -> EngineResult<Vec<Batch>> {
        self.scheduler.pending_attempts()
    }

    /// Claimed records whose attempt was never recorded.
    pub async fn orphaned_attempts(&self) -> EngineResult<Vec<AttemptId>> {
        self.scheduler.orphaned_attempts().await
    }

    pub async fn reconcile(&self, attempt: AttemptId, resolution: Resolution) -> EngineResult<Batch> {
        self.scheduler.reconcile(attempt, resolution).await
    }

    pub fn stats(&self) -> EngineResult<AnchoringStats> {
        AnchoringStats::collect(self.store.as_ref())
    }

    // ---- Revocation ----

    pub async fn revoke(&self, id: &ArtifactId) -> EngineResult<AnchorRecord> {
        self.revoker.revoke(id).await
    }

    // ---- Proofs and verification ----

    /// Self-contained proof for an anchored or revoked artifact.
    pub fn export_proof(&self, id: &ArtifactId) -> EngineResult<ProofBundle> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        ProofBundle::from_record(&record).ok_or(EngineError::NotAnchored {
            id: id.clone(),
            status: record.status,
        })
    }

    pub async fn verify_id(&self, id: &ArtifactId) -> EngineResult<VerificationResult> {
        self.verifier.verify_id(id).await
    }

    pub async fn verify_bytes(&self, bytes: &[u8]) -> EngineResult<VerificationResult> {
        self.verifier.verify_bytes(bytes).await
    }

    pub async fn verify_proof(&self, proof: &DetachedProof) -> VerificationResult {
        self.verifier.verify_detached(proof).await
    }

    pub async fn verify_bundle(&self, bundle: &ProofBundle) -> VerificationResult {
        self.verifier.verify_bundle(bundle).await
    }

    pub async fn verify_many(&self, ids: &[ArtifactId]) -> EngineResult<Vec<VerificationResult>> {
        self.verifier.verify_many(ids).await
    }

    pub async fn verify_many_bytes<B: AsRef<[u8]> + Sync>(
        &self,
        artifacts: &[B],
    ) -> EngineResult<Vec<VerificationResult>> {
        self.verifier.verify_many_bytes(artifacts).await
    }

    /// Re-read the artifact's stored bytes and check them against the
    /// recorded fingerprint before running the full verification.
    pub async fn verify_stored(&self, id: &ArtifactId) -> EngineResult<VerificationResult> {
        let Some(record) = self.store.get(id)? else {
            return self.verifier.verify_id(id).await;
        };
        let Some(bytes) = self.artifacts.read_bytes(id)? else {
            return Err(EngineError::ArtifactBytesMissing(id.clone()));
        };
        let actual = fingerprint(&bytes);
        if actual != record.fingerprint {
            // Changed bytes are NOT_FOUND for this id; the ledger is not consulted.
            return Ok(VerificationResult::not_found(format!(
                "stored bytes of {id} no longer match the recorded fingerprint"
            ))
            .with_fingerprint(actual));
        }
        Ok(self.verifier.verify_record(&record).await)
    }
}

impl std::fmt::Debug for AnchorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorEngine")
            .field("ledger", &self.ledger.name())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{LedgerCheck, VerificationStatus};
    use notary_ledger::{InMemoryLedger, LedgerFault};
    use notary_store::{InMemoryArtifactSource, InMemoryRecordStore};
    use notary_types::AnchorStatus;

    fn engine() -> (AnchorEngine, Arc<InMemoryArtifactSource>) {
        let artifacts = Arc::new(InMemoryArtifactSource::new());
        let engine = AnchorEngine::with_ledger(
            EngineConfig::default(),
            Arc::new(InMemoryRecordStore::new()),
            artifacts.clone(),
            Arc::new(InMemoryLedger::new()),
        )
        .unwrap();
        (engine, artifacts)
    }

    #[tokio::test]
    async fn issue_trigger_export() {
        let (engine, _) = engine();
        let id = ArtifactId::new("cert-1");
        engine
            .issue_bytes(id.clone(), ArtifactKind::Certificate, b"pdf")
            .unwrap();
        assert!(matches!(
            engine.export_proof(&id),
            Err(EngineError::NotAnchored { status: AnchorStatus::Unanchored, .. })
        ));

        engine.trigger().await.unwrap();
        let bundle = engine.export_proof(&id).unwrap();
        assert!(notary_crypto::verify_bundle(&bundle));
        assert!(engine.verify_bundle(&bundle).await.is_verified());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.anchored_count, 1);
        assert!(stats.last_anchored_batch.is_some());
    }

    #[tokio::test]
    async fn verify_stored_detects_changed_bytes() {
        let (engine, artifacts) = engine();
        let id = ArtifactId::new("doc-1");
        artifacts.put(id.clone(), b"original".to_vec()).unwrap();
        engine.issue_stored(id.clone(), ArtifactKind::Document).unwrap();
        engine.trigger().await.unwrap();

        assert!(engine.verify_stored(&id).await.unwrap().is_verified());

        artifacts.put(id.clone(), b"tampered".to_vec()).unwrap();
        let result = engine.verify_stored(&id).await.unwrap();
        assert_eq!(result.status, VerificationStatus::NotFound);
        assert_eq!(result.ledger, LedgerCheck::Skipped);
        assert_eq!(result.fingerprint, Some(fingerprint(b"tampered")));
        assert!(result.reason.contains("no longer match"));
    }

    #[tokio::test]
    async fn verify_stored_mismatch_never_waits_on_ledger() {
        let artifacts = Arc::new(InMemoryArtifactSource::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = AnchorEngine::with_ledger(
            EngineConfig::default(),
            Arc::new(InMemoryRecordStore::new()),
            artifacts.clone(),
            ledger.clone(),
        )
        .unwrap();
        let id = ArtifactId::new("doc-2");
        artifacts.put(id.clone(), b"original".to_vec()).unwrap();
        engine.issue_stored(id.clone(), ArtifactKind::Document).unwrap();
        engine.trigger().await.unwrap();

        artifacts.put(id.clone(), b"tampered".to_vec()).unwrap();
        ledger.set_fault(Some(LedgerFault::Stall));
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), engine.verify_stored(&id))
            .await
            .expect("no ledger call on byte mismatch")
            .unwrap();
        assert_eq!(result.status, VerificationStatus::NotFound);
    }

    #[tokio::test]
    async fn start_and_shutdown() {
        let (engine, _) = engine();
        assert!(engine.start());
        assert!(!engine.start());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_scheduler_does_not_start() {
        let mut config = EngineConfig::default();
        config.scheduler.enabled = false;
        let engine = AnchorEngine::with_ledger(
            config,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryArtifactSource::new()),
            Arc::new(InMemoryLedger::new()),
        )
        .unwrap();
        assert!(!engine.start());
        engine.shutdown().await.unwrap();
    }

    #[test]
    fn open_connects_configured_ledger() {
        let engine = AnchorEngine::open(
            EngineConfig::default(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryArtifactSource::new()),
        )
        .unwrap();
        assert_eq!(engine.ledger_name(), "memory");
    }
}
