use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use notary_types::ArtifactId;

use crate::error::{StoreError, StoreResult};

/// Read access to raw artifact bytes.
///
/// Used to fingerprint stored artifacts at issue time and to re-check them
/// against their record later.
pub trait ArtifactSource: Send + Sync {
    /// Bytes stored under `id`, or `None` if there are none.
    fn read_bytes(&self, id: &ArtifactId) -> StoreResult<Option<Vec<u8>>>;
}

/// Artifact bytes held in memory.
#[derive(Debug, Default)]
pub struct InMemoryArtifactSource {
    blobs: RwLock<HashMap<ArtifactId, Vec<u8>>>,
}

impl InMemoryArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the bytes for `id`.
    pub fn put(&self, id: ArtifactId, bytes: impl Into<Vec<u8>>) -> StoreResult<()> {
        self.blobs
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(id, bytes.into());
        Ok(())
    }
}

impl ArtifactSource for InMemoryArtifactSource {
    fn read_bytes(&self, id: &ArtifactId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .get(id)
            .cloned())
    }
}

/// Artifact bytes stored as one file per artifact id under a root directory.
#[derive(Clone, Debug)]
pub struct FsArtifactSource {
    root: PathBuf,
}

impl FsArtifactSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &ArtifactId) -> StoreResult<PathBuf> {
        let key = id.as_str();
        if key.is_empty()
            || key == "."
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl ArtifactSource for FsArtifactSource {
    fn read_bytes(&self, id: &ArtifactId) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_roundtrip() {
        let source = InMemoryArtifactSource::new();
        let id = ArtifactId::new("doc-1");
        assert!(source.read_bytes(&id).unwrap().is_none());
        source.put(id.clone(), b"hello".to_vec()).unwrap();
        assert_eq!(source.read_bytes(&id).unwrap().as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn fs_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cert-7"), b"pdf bytes").unwrap();
        let source = FsArtifactSource::new(dir.path());

        let bytes = source.read_bytes(&ArtifactId::new("cert-7")).unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"pdf bytes"[..]));
        assert!(source.read_bytes(&ArtifactId::new("cert-8")).unwrap().is_none());
    }

    #[test]
    fn fs_source_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsArtifactSource::new(dir.path());
        for key in ["../etc/passwd", "a/b", "a\\b", "", ".."] {
            assert!(
                matches!(
                    source.read_bytes(&ArtifactId::new(key)),
                    Err(StoreError::InvalidKey(_))
                ),
                "{key:?} should be rejected"
            );
        }
    }
}
