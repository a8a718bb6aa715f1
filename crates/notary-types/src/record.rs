use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::fingerprint::{Fingerprint, NodeHash};
use crate::ids::{ArtifactId, AttemptId, BatchId, TxRef};

/// Anchoring lifecycle of a single artifact.
///
/// `Unanchored -> Claimed -> Anchored -> Revoked`. A claim may be released
/// back to `Unanchored` only when its publish failed before any ledger write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorStatus {
    Unanchored,
    Claimed,
    Anchored,
    Revoked,
}

impl AnchorStatus {
    /// Returns `true` once the record carries a proof, root and batch id.
    pub fn has_proof(self) -> bool {
        matches!(self, Self::Anchored | Self::Revoked)
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unanchored => "UNANCHORED",
            Self::Claimed => "CLAIMED",
            Self::Anchored => "ANCHORED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// The two kinds of issued artifact that share the anchoring engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Certificate,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Certificate => f.write_str("certificate"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "certificate" => Ok(Self::Certificate),
            other => Err(TypeError::UnknownVariant {
                what: "artifact kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted anchoring metadata for one issued artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub artifact_id: ArtifactId,
    pub kind: ArtifactKind,
    pub fingerprint: Fingerprint,
    pub status: AnchorStatus,
    /// Attempt currently holding the claim; set only while `Claimed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<NodeHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Vec<NodeHash>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<TxRef>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_tx: Option<TxRef>,
}

impl AnchorRecord {
    /// A freshly issued, not yet anchored record.
    pub fn unanchored(
        artifact_id: ArtifactId,
        kind: ArtifactKind,
        fingerprint: Fingerprint,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            artifact_id,
            kind,
            fingerprint,
            status: AnchorStatus::Unanchored,
            claim: None,
            batch_id: None,
            merkle_root: None,
            proof: None,
            tx_ref: None,
            issued_at,
            anchored_at: None,
            revoked_at: None,
            revocation_tx: None,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.status.has_proof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnchorRecord {
        AnchorRecord::unanchored(
            ArtifactId::new("doc-1"),
            ArtifactKind::Document,
            Fingerprint::from_hash([7; 32]),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn new_record_is_unanchored_and_bare() {
        let record = sample();
        assert_eq!(record.status, AnchorStatus::Unanchored);
        assert!(!record.is_anchored());
        assert!(record.proof.is_none());
        assert!(record.batch_id.is_none());
    }

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_string(&AnchorStatus::Unanchored).unwrap();
        assert_eq!(json, "\"UNANCHORED\"");
        assert_eq!(AnchorStatus::Revoked.to_string(), "REVOKED");
    }

    #[test]
    fn kind_parses() {
        assert_eq!("certificate".parse::<ArtifactKind>().unwrap(), ArtifactKind::Certificate);
        assert!("diploma".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn unset_fields_are_omitted() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("proof").is_none());
        assert!(json.get("claim").is_none());
        assert_eq!(json["status"], "UNANCHORED");
        let back: AnchorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
