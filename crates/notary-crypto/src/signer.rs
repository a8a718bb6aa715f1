use serde::{Deserialize, Serialize};

use notary_types::NodeHash;

/// Domain tag prepended to every root the issuer signs for publication.
pub const PUBLISH_DOMAIN: &[u8] = b"notary-publish-v1:";
/// Domain tag prepended to every fingerprint the issuer signs for revocation.
pub const REVOKE_DOMAIN: &[u8] = b"notary-revoke-v1:";

/// Ed25519 issuer signing key (private).
///
/// Held by the ledger adapter only. Custody and rotation happen outside
/// this crate; the key is loaded once at process start.
pub struct IssuerKey(ed25519_dalek::SigningKey);

/// Ed25519 issuer verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct IssuerPublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature, serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] ed25519_dalek::Signature);

impl IssuerKey {
    /// Generate a new random key (tests and local development).
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from a raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Parse a hex-encoded 32-byte secret (optionally `0x`-prefixed).
    pub fn from_hex(secret: &str) -> Result<Self, SignatureError> {
        let secret = secret.trim();
        let secret = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(secret).map_err(|_| SignatureError::InvalidKey)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self::from_bytes(arr))
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> IssuerPublicKey {
        IssuerPublicKey(self.0.verifying_key())
    }

    /// Sign an arbitrary message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// Sign a Merkle root for publication.
    pub fn sign_publish(&self, root: &NodeHash) -> Signature {
        self.sign(&domain_message(PUBLISH_DOMAIN, root))
    }

    /// Sign a fingerprint for revocation.
    pub fn sign_revoke(&self, fingerprint: &NodeHash) -> Signature {
        self.sign(&domain_message(REVOKE_DOMAIN, fingerprint))
    }
}

impl IssuerPublicKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// Verify a publish signature over `root`.
    pub fn verify_publish(&self, root: &NodeHash, signature: &Signature) -> Result<(), SignatureError> {
        self.verify(&domain_message(PUBLISH_DOMAIN, root), signature)
    }

    /// Verify a revocation signature over `fingerprint`.
    pub fn verify_revoke(
        &self,
        fingerprint: &NodeHash,
        signature: &Signature,
    ) -> Result<(), SignatureError> {
        self.verify(&domain_message(REVOKE_DOMAIN, fingerprint), signature)
    }

    /// Hex-encoded public key, as sent to the ledger gateway.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|_| SignatureError::InvalidKey)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::InvalidKey)?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }
}

fn domain_message(domain: &[u8], hash: &NodeHash) -> Vec<u8> {
    let mut message = Vec::with_capacity(domain.len() + 32);
    message.extend_from_slice(domain);
    message.extend_from_slice(hash.as_bytes());
    message
}

impl std::fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IssuerKey(<redacted>)")
    }
}

impl std::fmt::Debug for IssuerPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IssuerPublicKey({})", self.to_hex())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0.to_bytes()[..8]))
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

mod signature_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &ed25519_dalek::Signature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(sig.to_bytes()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ed25519_dalek::Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64-byte signature"))?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(seed: u8) -> NodeHash {
        NodeHash::from_hash([seed; 32])
    }

    #[test]
    fn publish_signature_verifies() {
        let key = IssuerKey::generate();
        let sig = key.sign_publish(&root(1));
        assert!(key.public_key().verify_publish(&root(1), &sig).is_ok());
    }

    #[test]
    fn publish_signature_is_not_a_revoke_signature() {
        let key = IssuerKey::generate();
        let sig = key.sign_publish(&root(1));
        assert_eq!(
            key.public_key().verify_revoke(&root(1), &sig),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn wrong_key_fails() {
        let a = IssuerKey::generate();
        let b = IssuerKey::generate();
        let sig = a.sign_revoke(&root(2));
        assert!(b.public_key().verify_revoke(&root(2), &sig).is_err());
    }

    #[test]
    fn hex_secret_is_deterministic() {
        let hex_secret = "0x".to_string() + &"11".repeat(32);
        let a = IssuerKey::from_hex(&hex_secret).unwrap();
        let b = IssuerKey::from_bytes([0x11; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(IssuerKey::from_hex("abcd").unwrap_err(), SignatureError::InvalidKey);
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let key = IssuerKey::generate();
        let parsed = IssuerPublicKey::from_hex(&key.public_key().to_hex()).unwrap();
        assert_eq!(parsed, key.public_key());
    }

    #[test]
    fn signature_serde_is_hex() {
        let key = IssuerKey::generate();
        let sig = key.sign(b"message");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json.len(), 128 + 2);
        let parsed: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn debug_redacts_secret() {
        let key = IssuerKey::generate();
        assert_eq!(format!("{key:?}"), "IssuerKey(<redacted>)");
    }
}
