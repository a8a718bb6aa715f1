//! Anchoring and verification engine for Notary.
//!
//! Issued artifacts are recorded as UNANCHORED fingerprints. A scheduler
//! periodically claims a batch of them, builds a sorted-pair Merkle tree,
//! publishes the root to a commitment ledger once, and stores each record's
//! inclusion proof. The verifier later re-derives the root from the proof,
//! cross-checks it against the ledger, and checks revocation.
//!
//! # Architecture
//!
//! ```text
//!   Issuer ──► RecordStore ◄── Scheduler ──► CommitmentLedger
//!                  ▲                              ▲
//!                  └────────── Verifier ──────────┘
//! ```
//!
//! [`AnchorEngine`] owns all of these and is what the HTTP server and the
//! CLI talk to.

pub mod anchorable;
pub mod config;
pub mod engine;
pub mod error;
pub mod issuer;
pub mod revocation;
pub mod scheduler;
pub mod stats;
pub mod verifier;

pub use anchorable::{
    Anchorable, IssuedCertificate, IssuedDocument, CERTIFICATE_HASH_FIELDS, DOCUMENT_HASH_FIELDS,
};
pub use config::{EngineConfig, SchedulerConfig, VerificationConfig};
pub use engine::AnchorEngine;
pub use error::{EngineError, EngineResult};
pub use issuer::Issuer;
pub use revocation::Revoker;
pub use scheduler::{Resolution, RunOutcome, Scheduler};
pub use stats::AnchoringStats;
pub use verifier::{LedgerCheck, VerificationResult, VerificationStatus, Verifier};
