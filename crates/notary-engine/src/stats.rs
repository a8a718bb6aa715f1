use serde::{Deserialize, Serialize};

use notary_store::{AnchorStore, BatchStore, RecordStore};
use notary_types::{AnchorStatus, Batch};

use crate::error::EngineResult;

/// Anchoring progress counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoringStats {
    pub unanchored_count: usize,
    pub claimed_count: usize,
    pub anchored_count: usize,
    pub revoked_count: usize,
    /// Attempts whose publish result is still unknown.
    pub pending_attempts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_anchored_batch: Option<Batch>,
}

impl AnchoringStats {
    pub fn collect(store: &dyn AnchorStore) -> EngineResult<Self> {
        Ok(Self {
            unanchored_count: store.count(AnchorStatus::Unanchored)?,
            claimed_count: store.count(AnchorStatus::Claimed)?,
            anchored_count: store.count(AnchorStatus::Anchored)?,
            revoked_count: store.count(AnchorStatus::Revoked)?,
            pending_attempts: store.pending_batches()?.len(),
            last_anchored_batch: store.last_anchored_batch()?,
        })
    }

    /// Records that have been issued, in any state.
    pub fn total(&self) -> usize {
        self.unanchored_count + self.claimed_count + self.anchored_count + self.revoked_count
    }
}
