//! Commitment ledger clients for Notary.
//!
//! The ledger is the external, append-only system that Merkle roots are
//! published to. This crate provides:
//! - the [`CommitmentLedger`] async trait boundary
//! - [`InMemoryLedger`], a complete in-process ledger with fault injection
//! - [`RpcLedgerClient`], a JSON-RPC client for a ledger gateway
//! - [`GuardedLedger`], which bounds every call with a timeout and serializes
//!   publishes
//! - [`LedgerConfig`] and [`connect`] to build a client from configuration
//!
//! Publishing is the only operation whose failure modes matter beyond
//! "try again later": [`LedgerError::is_unconfirmed`] tells the caller that a
//! write may have landed and must not be retried blindly.

pub mod config;
pub mod error;
pub mod guard;
pub mod memory;
pub mod rpc;
pub mod traits;

pub use config::{connect, LedgerBackend, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use guard::GuardedLedger;
pub use memory::{InMemoryLedger, LedgerFault};
pub use rpc::RpcLedgerClient;
pub use traits::{CommitmentLedger, PublishReceipt, RevocationReceipt};
