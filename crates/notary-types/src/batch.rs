use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::NodeHash;
use crate::ids::{AttemptId, BatchId, TxRef};

/// Lifecycle of one anchoring attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Built and (possibly) sent; ledger result not yet known.
    Pending,
    /// Root confirmed on the ledger. Root and batch id are now immutable.
    Anchored,
    /// Publish failed before any ledger write. Never retried under this attempt.
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Anchored => "ANCHORED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One Merkle commitment over a set of fingerprints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub attempt_id: AttemptId,
    /// Assigned by the ledger; `None` until publish is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    pub root: NodeHash,
    pub leaf_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<TxRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    /// Last failure reason, for operator dashboards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Batch {
    /// A freshly built attempt awaiting publish.
    pub fn pending(attempt_id: AttemptId, root: NodeHash, leaf_count: usize) -> Self {
        Self {
            attempt_id,
            batch_id: None,
            root,
            leaf_count,
            tx_ref: None,
            created_at: Utc::now(),
            anchored_at: None,
            status: BatchStatus::Pending,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_batch_has_no_ledger_fields() {
        let batch = Batch::pending(AttemptId::new(), NodeHash::from_hash([1; 32]), 3);
        assert_eq!(batch.status, BatchStatus::Pending);
        assert!(batch.batch_id.is_none());
        assert!(batch.tx_ref.is_none());
        assert_eq!(batch.leaf_count, 3);
    }

    #[test]
    fn status_display() {
        assert_eq!(BatchStatus::Failed.to_string(), "FAILED");
        assert_eq!(
            serde_json::to_string(&BatchStatus::Anchored).unwrap(),
            "\"ANCHORED\""
        );
    }
}
