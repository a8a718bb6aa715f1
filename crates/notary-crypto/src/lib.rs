//! Cryptographic primitives for Notary.
//!
//! Provides SHA-256 artifact fingerprinting, binary Merkle trees with
//! sorted-pair hashing and standalone proof verification, and the Ed25519
//! issuer key used to sign ledger writes.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;
pub mod merkle;
pub mod signer;

pub use hasher::{fingerprint, hash_pair, Fingerprinter};
pub use merkle::{verify_bundle, verify_proof, MerkleError, MerkleTree};
pub use signer::{IssuerKey, IssuerPublicKey, Signature, SignatureError};
