use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use notary_types::{BatchId, Fingerprint, NodeHash, TxRef};

use crate::error::LedgerResult;

/// Ledger acknowledgement of a published root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub batch_id: BatchId,
    pub tx_ref: TxRef,
}

/// Ledger acknowledgement of a revocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationReceipt {
    pub tx_ref: TxRef,
}

/// Boundary to the external append-only commitment ledger.
///
/// Implementations hold no global state: every client is constructed
/// explicitly and shared through an `Arc`.
#[async_trait]
pub trait CommitmentLedger: Send + Sync {
    /// Short backend name for logs and `/v1/info`.
    fn name(&self) -> &'static str;

    /// Publish a Merkle root. Callers invoke this at most once per batch
    /// attempt.
    async fn publish(&self, root: NodeHash) -> LedgerResult<PublishReceipt>;

    /// Root recorded under `batch_id`, or `None` if the ledger has none.
    async fn get_root(&self, batch_id: &BatchId) -> LedgerResult<Option<NodeHash>>;

    /// Record `fingerprint` as revoked. Fails with `AlreadyRevoked` if it is.
    async fn revoke(&self, fingerprint: Fingerprint) -> LedgerResult<RevocationReceipt>;

    async fn is_revoked(&self, fingerprint: Fingerprint) -> LedgerResult<bool>;

    /// Release connections. Later calls may fail.
    async fn close(&self) -> LedgerResult<()> {
        Ok(())
    }
}
