use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use notary_crypto::fingerprint;
use notary_store::{AnchorStore, ArtifactSource, RecordStore};
use notary_types::{AnchorRecord, ArtifactId, ArtifactKind};

use crate::anchorable::Anchorable;
use crate::error::{EngineError, EngineResult};

/// Issue-time hook: records a new artifact as UNANCHORED so the next
/// scheduler run picks it up.
#[derive(Clone)]
pub struct Issuer {
    store: Arc<dyn AnchorStore>,
    artifacts: Arc<dyn ArtifactSource>,
}

impl Issuer {
    pub fn new(store: Arc<dyn AnchorStore>, artifacts: Arc<dyn ArtifactSource>) -> Self {
        Self { store, artifacts }
    }

    pub fn issue(&self, artifact: &dyn Anchorable) -> EngineResult<AnchorRecord> {
        let record = AnchorRecord::unanchored(
            artifact.artifact_id().clone(),
            artifact.kind(),
            artifact.fingerprint(),
            Utc::now(),
        );
        self.store.insert(record.clone())?;
        info!(
            artifact = %record.artifact_id,
            kind = %record.kind,
            fingerprint = %record.fingerprint.short_hex(),
            "artifact issued"
        );
        Ok(record)
    }

    /// Fingerprint `bytes` and issue them as `id`.
    pub fn issue_bytes(
        &self,
        id: ArtifactId,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> EngineResult<AnchorRecord> {
        self.issue(&Issued {
            id,
            kind,
            fingerprint: fingerprint(bytes),
        })
    }

    /// Read the artifact's bytes from the artifact source and issue them.
    pub fn issue_stored(&self, id: ArtifactId, kind: ArtifactKind) -> EngineResult<AnchorRecord> {
        let bytes = self
            .artifacts
            .read_bytes(&id)?
            .ok_or_else(|| EngineError::ArtifactBytesMissing(id.clone()))?;
        self.issue_bytes(id, kind, &bytes)
    }
}

struct Issued {
    id: ArtifactId,
    kind: ArtifactKind,
    fingerprint: notary_types::Fingerprint,
}

impl Anchorable for Issued {
    fn artifact_id(&self) -> &ArtifactId {
        &self.id
    }

    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn fingerprint(&self) -> notary_types::Fingerprint {
        self.fingerprint
    }
}
