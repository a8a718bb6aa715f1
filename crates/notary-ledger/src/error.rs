use notary_types::Fingerprint;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The ledger could not be reached. Nothing was sent.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time. For writes the outcome is unknown.
    #[error("ledger call `{op}` timed out after {after_ms} ms")]
    Timeout { op: &'static str, after_ms: u64 },

    /// A write was sent but its result could not be confirmed.
    #[error("ledger write unconfirmed: {0}")]
    Unconfirmed(String),

    /// The ledger received the request and refused it.
    #[error("ledger rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("fingerprint already revoked: {0}")]
    AlreadyRevoked(Fingerprint),

    #[error("not found on ledger: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid ledger configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// Returns `true` if a write may have been applied even though the call
    /// failed. Such writes must be reconciled, never retried.
    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::Unconfirmed(_) | Self::Timeout { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
