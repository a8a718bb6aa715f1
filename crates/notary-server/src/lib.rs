//! HTTP API for Notary.
//!
//! Exposes the anchoring engine under `/v1`: the issue-time hook, manual
//! anchoring and reconciliation, proof export, and verification by id,
//! uploaded bytes, detached proof, or in bulk.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ArtifactsConfig, ServerConfig, ServiceConfig};
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use server::NotaryServer;
pub use state::AppState;
