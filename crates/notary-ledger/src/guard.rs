use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use notary_types::{BatchId, Fingerprint, NodeHash};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{CommitmentLedger, PublishReceipt, RevocationReceipt};

/// Wraps a ledger so that every call is bounded by a timeout and at most one
/// `publish` is in flight at a time. Reads are not serialized.
pub struct GuardedLedger {
    inner: Arc<dyn CommitmentLedger>,
    timeout: Duration,
    publish_lock: Mutex<()>,
}

impl GuardedLedger {
    pub fn new(inner: Arc<dyn CommitmentLedger>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = LedgerResult<T>>,
    ) -> LedgerResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = self.timeout.as_millis() as u64;
                warn!(op, after_ms, backend = self.inner.name(), "ledger call timed out");
                Err(LedgerError::Timeout { op, after_ms })
            }
        }
    }
}

#[async_trait]
impl CommitmentLedger for GuardedLedger {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn publish(&self, root: NodeHash) -> LedgerResult<PublishReceipt> {
        let _in_flight = self.publish_lock.lock().await;
        self.bounded("publish", self.inner.publish(root)).await
    }

    async fn get_root(&self, batch_id: &BatchId) -> LedgerResult<Option<NodeHash>> {
        self.bounded("get_root", self.inner.get_root(batch_id)).await
    }

    async fn revoke(&self, fingerprint: Fingerprint) -> LedgerResult<RevocationReceipt> {
        self.bounded("revoke", self.inner.revoke(fingerprint)).await
    }

    async fn is_revoked(&self, fingerprint: Fingerprint) -> LedgerResult<bool> {
        self.bounded("is_revoked", self.inner.is_revoked(fingerprint)).await
    }

    async fn close(&self) -> LedgerResult<()> {
        self.bounded("close", self.inner.close()).await
    }
}

impl std::fmt::Debug for GuardedLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedLedger")
            .field("backend", &self.inner.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
