use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use notary_ledger::{CommitmentLedger, LedgerError};
use notary_store::{AnchorStore, RecordStore};
use notary_types::{AnchorRecord, AnchorStatus, ArtifactId};

use crate::error::{EngineError, EngineResult};

/// Revokes anchored artifacts on the ledger and records it locally.
///
/// The proof is kept: a revoked artifact still verifies as REVOKED rather
/// than NOT_FOUND.
#[derive(Clone)]
pub struct Revoker {
    store: Arc<dyn AnchorStore>,
    ledger: Arc<dyn CommitmentLedger>,
}

impl Revoker {
    pub fn new(store: Arc<dyn AnchorStore>, ledger: Arc<dyn CommitmentLedger>) -> Self {
        Self { store, ledger }
    }

    pub async fn revoke(&self, id: &ArtifactId) -> EngineResult<AnchorRecord> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;

        match record.status {
            AnchorStatus::Revoked => return Ok(record),
            AnchorStatus::Anchored => {}
            status => {
                return Err(EngineError::NotAnchored {
                    id: id.clone(),
                    status,
                })
            }
        }

        let tx_ref = match self.ledger.revoke(record.fingerprint).await {
            Ok(receipt) => Some(receipt.tx_ref),
            Err(LedgerError::AlreadyRevoked(_)) => {
                warn!(artifact = %id, "fingerprint already revoked on ledger");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let revoked = self.store.mark_revoked(id, Utc::now(), tx_ref)?;
        info!(
            artifact = %id,
            tx_ref = ?revoked.revocation_tx,
            "artifact revoked"
        );
        Ok(revoked)
    }
}
