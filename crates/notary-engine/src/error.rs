use thiserror::Error;

use notary_types::{AnchorStatus, ArtifactId, ArtifactKind, AttemptId, BatchId, BatchStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    #[error("artifact {id} is not anchored (status {status})")]
    NotAnchored { id: ArtifactId, status: AnchorStatus },

    #[error("artifact bytes not found: {0}")]
    ArtifactBytesMissing(ArtifactId),

    #[error("{kind} record has no stored hash (looked for {tried})")]
    MissingHash { kind: ArtifactKind, tried: String },

    #[error("invalid stored hash in field `{field}`: {source}")]
    InvalidHash {
        field: &'static str,
        #[source]
        source: notary_types::TypeError,
    },

    #[error("unknown batch attempt: {0}")]
    UnknownAttempt(AttemptId),

    #[error("batch attempt {attempt} is already resolved ({status})")]
    AttemptResolved { attempt: AttemptId, status: BatchStatus },

    #[error("ledger batch {batch_id} does not hold the root of attempt {attempt}")]
    ReconcileMismatch { attempt: AttemptId, batch_id: BatchId },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] notary_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] notary_ledger::LedgerError),

    #[error("merkle error: {0}")]
    Merkle(#[from] notary_crypto::MerkleError),

    #[error(transparent)]
    Type(#[from] notary_types::TypeError),
}

pub type EngineResult<T> = Result<T, EngineError>;
