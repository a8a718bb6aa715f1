use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use notary_crypto::fingerprint;
use notary_types::{BatchId, Fingerprint, NodeHash, TxRef};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{CommitmentLedger, PublishReceipt, RevocationReceipt};

/// Fault injected into every subsequent call of an [`InMemoryLedger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerFault {
    /// Every call fails with `Unavailable` before touching state.
    Unavailable,
    /// Writes are applied but reported as `Unconfirmed`. Reads succeed.
    Unconfirmed,
    /// Writes are refused with `Rejected`. Reads succeed.
    Rejected,
    /// Every call hangs forever.
    Stall,
}

/// In-process commitment ledger for tests, local demos, and embedding.
///
/// Batch ids are monotonic decimal strings starting at `"1"`. Transaction
/// references are synthetic `0x`-prefixed hashes.
pub struct InMemoryLedger {
    inner: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    roots: Vec<NodeHash>,
    revoked: HashMap<Fingerprint, TxRef>,
    tx_counter: u64,
    publish_calls: usize,
    fault: Option<LedgerFault>,
}

impl LedgerState {
    fn next_tx(&mut self, kind: &str) -> TxRef {
        self.tx_counter += 1;
        let digest = fingerprint(format!("memory-ledger:{kind}:{}", self.tx_counter).as_bytes());
        TxRef::new(digest.to_hex_prefixed())
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerState::default()),
        }
    }

    /// Inject a fault into all following calls, or clear it with `None`.
    pub fn set_fault(&self, fault: Option<LedgerFault>) {
        if let Ok(mut state) = self.inner.lock() {
            state.fault = fault;
        }
    }

    /// Number of `publish` calls received, including failed ones.
    pub fn publish_calls(&self) -> usize {
        self.inner.lock().map(|s| s.publish_calls).unwrap_or(0)
    }

    /// Every recorded root with its batch id, in publish order.
    pub fn published_roots(&self) -> Vec<(BatchId, NodeHash)> {
        self.inner
            .lock()
            .map(|s| {
                s.roots
                    .iter()
                    .enumerate()
                    .map(|(i, root)| (batch_id_for(i), *root))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn state(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger state lock poisoned".into()))
    }

    /// Applies the current fault before an operation. Returns the fault so
    /// writes can decide how to report their result.
    async fn gate(&self, op: &str) -> LedgerResult<Option<LedgerFault>> {
        let fault = self.state()?.fault;
        match fault {
            Some(LedgerFault::Unavailable) => {
                Err(LedgerError::Unavailable(format!("{op}: injected outage")))
            }
            Some(LedgerFault::Stall) => std::future::pending().await,
            other => Ok(other),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn batch_id_for(index: usize) -> BatchId {
    BatchId::new((index + 1).to_string())
}

fn rejected(op: &str) -> LedgerError {
    LedgerError::Rejected {
        code: -32000,
        message: format!("{op}: injected rejection"),
    }
}

#[async_trait]
impl CommitmentLedger for InMemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, root: NodeHash) -> LedgerResult<PublishReceipt> {
        if let Ok(mut state) = self.inner.lock() {
            state.publish_calls += 1;
        }
        let fault = self.gate("publish").await?;
        if fault == Some(LedgerFault::Rejected) {
            return Err(rejected("publish"));
        }

        let mut state = self.state()?;
        state.roots.push(root);
        let batch_id = batch_id_for(state.roots.len() - 1);
        let tx_ref = state.next_tx("publish");
        debug!(batch_id = %batch_id, root = %root.short_hex(), "root recorded");

        if fault == Some(LedgerFault::Unconfirmed) {
            return Err(LedgerError::Unconfirmed(format!(
                "publish of {} sent, receipt lost",
                root.short_hex()
            )));
        }
        Ok(PublishReceipt { batch_id, tx_ref })
    }

    async fn get_root(&self, batch_id: &BatchId) -> LedgerResult<Option<NodeHash>> {
        self.gate("get_root").await?;
        let state = self.state()?;
        let root = batch_id
            .as_str()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| state.roots.get(i).copied());
        Ok(root)
    }

    async fn revoke(&self, fingerprint: Fingerprint) -> LedgerResult<RevocationReceipt> {
        let fault = self.gate("revoke").await?;
        if fault == Some(LedgerFault::Rejected) {
            return Err(rejected("revoke"));
        }

        let mut state = self.state()?;
        if state.revoked.contains_key(&fingerprint) {
            return Err(LedgerError::AlreadyRevoked(fingerprint));
        }
        let tx_ref = state.next_tx("revoke");
        state.revoked.insert(fingerprint, tx_ref.clone());

        if fault == Some(LedgerFault::Unconfirmed) {
            return Err(LedgerError::Unconfirmed(format!(
                "revocation of {} sent, receipt lost",
                fingerprint.short_hex()
            )));
        }
        Ok(RevocationReceipt { tx_ref })
    }

    async fn is_revoked(&self, fingerprint: Fingerprint) -> LedgerResult<bool> {
        self.gate("is_revoked").await?;
        Ok(self.state()?.revoked.contains_key(&fingerprint))
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("published", &self.published_roots().len())
            .finish()
    }
}
