//! Record storage for Notary.
//!
//! The engine does not own a database. It consumes a generic document store
//! through two traits:
//!
//! - [`RecordStore`] -- one [`AnchorRecord`](notary_types::AnchorRecord) per
//!   issued artifact, filterable by status, fingerprint and batch
//! - [`BatchStore`] -- one [`Batch`](notary_types::Batch) per anchoring attempt
//!
//! plus [`ArtifactSource`] for reading raw artifact bytes back.
//!
//! # Storage Backends
//!
//! - [`InMemoryRecordStore`] -- `RwLock`-guarded maps for tests and embedding
//! - [`InMemoryArtifactSource`], [`FsArtifactSource`] -- artifact bytes
//!
//! # Design Rules
//!
//! 1. Claiming is a single conditional update: select-and-mark happens under
//!    one write lock (or one conditional statement in a database backend).
//! 2. Completing or releasing a claim only touches records still held by the
//!    same attempt.
//! 3. Bulk lookups are one call, never a loop of point reads.
//! 4. Records are never deleted.

pub mod artifact;
pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;

pub use artifact::{ArtifactSource, FsArtifactSource, InMemoryArtifactSource};
pub use error::{StoreError, StoreResult};
pub use filter::{ClaimCommit, RecordFilter};
pub use memory::InMemoryRecordStore;
pub use traits::{AnchorStore, BatchStore, RecordStore};
