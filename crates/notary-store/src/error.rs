use notary_types::{AnchorStatus, ArtifactId, AttemptId};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found: {0}")]
    NotFound(ArtifactId),

    /// The requested batch attempt was not found.
    #[error("batch attempt not found: {0}")]
    BatchNotFound(AttemptId),

    /// A record with this artifact id already exists.
    #[error("artifact already registered: {0}")]
    DuplicateArtifact(ArtifactId),

    /// The update would violate the record lifecycle.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: ArtifactId,
        from: AnchorStatus,
        to: AnchorStatus,
    },

    /// An anchored batch's root and id are immutable.
    #[error("batch attempt {0} is already anchored")]
    BatchImmutable(AttemptId),

    /// Artifact key is not acceptable to the backend (e.g. path traversal).
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
