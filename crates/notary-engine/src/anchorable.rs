use serde_json::Value;

use notary_crypto::fingerprint;
use notary_types::{ArtifactId, ArtifactKind, Fingerprint};

use crate::error::{EngineError, EngineResult};

/// Stored-hash fields accepted on document records, highest priority first.
pub const DOCUMENT_HASH_FIELDS: &[&str] = &["fingerprint", "contentHash", "fileHash"];

/// Stored-hash fields accepted on certificate records, highest priority first.
pub const CERTIFICATE_HASH_FIELDS: &[&str] = &["fingerprint", "certificateHash", "pdfHash"];

/// Anything that can be anchored: an id, a kind, and the fingerprint of its
/// exact bytes.
pub trait Anchorable: Send + Sync {
    fn artifact_id(&self) -> &ArtifactId;
    fn kind(&self) -> ArtifactKind;
    fn fingerprint(&self) -> Fingerprint;
}

/// An issued document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedDocument {
    pub id: ArtifactId,
    pub fingerprint: Fingerprint,
}

/// An issued certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub id: ArtifactId,
    pub fingerprint: Fingerprint,
}

impl IssuedDocument {
    pub fn new(id: impl Into<ArtifactId>, fingerprint: Fingerprint) -> Self {
        Self {
            id: id.into(),
            fingerprint,
        }
    }

    pub fn from_bytes(id: impl Into<ArtifactId>, bytes: &[u8]) -> Self {
        Self::new(id, fingerprint(bytes))
    }

    /// Adapt a raw document record, reading its hash from the first present
    /// field of [`DOCUMENT_HASH_FIELDS`].
    pub fn from_json(id: impl Into<ArtifactId>, record: &Value) -> EngineResult<Self> {
        let fp = stored_hash(record, ArtifactKind::Document, DOCUMENT_HASH_FIELDS)?;
        Ok(Self::new(id, fp))
    }
}

impl IssuedCertificate {
    pub fn new(id: impl Into<ArtifactId>, fingerprint: Fingerprint) -> Self {
        Self {
            id: id.into(),
            fingerprint,
        }
    }

    pub fn from_bytes(id: impl Into<ArtifactId>, bytes: &[u8]) -> Self {
        Self::new(id, fingerprint(bytes))
    }

    /// Adapt a raw certificate record, reading its hash from the first
    /// present field of [`CERTIFICATE_HASH_FIELDS`].
    pub fn from_json(id: impl Into<ArtifactId>, record: &Value) -> EngineResult<Self> {
        let fp = stored_hash(record, ArtifactKind::Certificate, CERTIFICATE_HASH_FIELDS)?;
        Ok(Self::new(id, fp))
    }
}

impl Anchorable for IssuedDocument {
    fn artifact_id(&self) -> &ArtifactId {
        &self.id
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Document
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl Anchorable for IssuedCertificate {
    fn artifact_id(&self) -> &ArtifactId {
        &self.id
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Certificate
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

/// First present string field wins. A present but malformed value is an
/// error; later aliases are not consulted.
fn stored_hash(
    record: &Value,
    kind: ArtifactKind,
    fields: &'static [&'static str],
) -> EngineResult<Fingerprint> {
    for &field in fields {
        if let Some(raw) = record.get(field).and_then(Value::as_str) {
            return Fingerprint::from_hex(raw)
                .map_err(|source| EngineError::InvalidHash { field, source });
        }
    }
    Err(EngineError::MissingHash {
        kind,
        tried: fields.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hex(b: u8) -> String {
        Fingerprint::from_hash([b; 32]).to_hex()
    }

    #[test]
    fn document_alias_priority() {
        let record = json!({"fileHash": hex(3), "contentHash": hex(2)});
        let doc = IssuedDocument::from_json("doc-1", &record).unwrap();
        assert_eq!(doc.fingerprint, Fingerprint::from_hash([2; 32]));
        assert_eq!(doc.kind(), ArtifactKind::Document);

        let record = json!({"fingerprint": hex(1), "contentHash": hex(2)});
        let doc = IssuedDocument::from_json("doc-1", &record).unwrap();
        assert_eq!(doc.fingerprint, Fingerprint::from_hash([1; 32]));
    }

    #[test]
    fn certificate_aliases_accept_prefixed_hex() {
        let record = json!({"pdfHash": format!("0x{}", hex(9))});
        let cert = IssuedCertificate::from_json("cert-1", &record).unwrap();
        assert_eq!(cert.fingerprint, Fingerprint::from_hash([9; 32]));
        assert_eq!(cert.artifact_id().as_str(), "cert-1");
    }

    #[test]
    fn document_aliases_do_not_cross_kinds() {
        let record = json!({"pdfHash": hex(9)});
        let err = IssuedDocument::from_json("doc-1", &record).unwrap_err();
        assert!(matches!(err, EngineError::MissingHash { kind: ArtifactKind::Document, .. }));
    }

    #[test]
    fn malformed_first_alias_is_an_error() {
        let record = json!({"certificateHash": "zz", "pdfHash": hex(4)});
        let err = IssuedCertificate::from_json("c", &record).unwrap_err();
        assert!(matches!(err, EngineError::InvalidHash { field: "certificateHash", .. }));
    }

    #[test]
    fn from_bytes_fingerprints_content() {
        let doc = IssuedDocument::from_bytes("d", b"hello");
        assert_eq!(doc.fingerprint, fingerprint(b"hello"));
    }
}
