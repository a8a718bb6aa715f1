//! Foundation types for Notary.
//!
//! This crate provides the identity, record, and proof types shared by every
//! other Notary crate.
//!
//! # Key Types
//!
//! - [`Fingerprint`]: SHA-256 content hash of an artifact (also used for Merkle nodes)
//! - [`ArtifactId`], [`BatchId`], [`TxRef`]: opaque identifiers
//! - [`AttemptId`]: UUID v7 identifier for one anchoring attempt
//! - [`AnchorRecord`] / [`AnchorStatus`]: per-artifact anchoring state
//! - [`Batch`] / [`BatchStatus`]: one published (or attempted) Merkle commitment
//! - [`ProofBundle`]: self-contained inclusion proof for offline verification

pub mod batch;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod proof;
pub mod record;

pub use batch::{Batch, BatchStatus};
pub use error::TypeError;
pub use fingerprint::{Fingerprint, NodeHash, FINGERPRINT_LEN};
pub use ids::{ArtifactId, AttemptId, BatchId, TxRef};
pub use proof::{DetachedProof, ProofBundle};
pub use record::{AnchorRecord, AnchorStatus, ArtifactKind};
