use std::collections::HashMap;
use std::sync::RwLock;

use lake_crypto::{ContentHasher, DigestAlgorithm};

use crate::error::{BinaryError, BinaryResult};
use crate::traits::{validate_digest, BinaryStore};

/// In-memory payload store for tests and embedding.
///
/// Reads always verify fixity.
pub struct InMemoryBinaryStore {
    hasher: ContentHasher,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBinaryStore {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            hasher: ContentHasher::new(algorithm),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct payloads stored.
    pub fn len(&self) -> BinaryResult<usize> {
        Ok(self.read_lock()?.len())
    }

    pub fn is_empty(&self) -> BinaryResult<bool> {
        Ok(self.read_lock()?.is_empty())
    }

    fn read_lock(&self) -> BinaryResult<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .read()
            .map_err(|_| BinaryError::Unavailable("binary lock poisoned".into()))
    }

    fn write_lock(
        &self,
    ) -> BinaryResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .write()
            .map_err(|_| BinaryError::Unavailable("binary lock poisoned".into()))
    }
}

impl Default for InMemoryBinaryStore {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

impl BinaryStore for InMemoryBinaryStore {
    fn algorithm(&self) -> DigestAlgorithm {
        self.hasher.algorithm()
    }

    fn put(&self, data: &[u8]) -> BinaryResult<String> {
        let digest = self.hasher.hash(data);
        self.write_lock()?
            .entry(digest.clone())
            .or_insert_with(|| data.to_vec());
        Ok(digest)
    }

    fn get(&self, digest: &str) -> BinaryResult<Vec<u8>> {
        validate_digest(self.algorithm(), digest)?;
        let data = self
            .read_lock()?
            .get(digest)
            .cloned()
            .ok_or_else(|| BinaryError::NotFound(digest.to_string()))?;
        let computed = self.hasher.hash(&data);
        if computed != digest {
            return Err(BinaryError::FixityMismatch {
                expected: digest.to_string(),
                computed,
            });
        }
        Ok(data)
    }

    fn verify(&self, digest: &str) -> BinaryResult<bool> {
        match self.get(digest) {
            Ok(_) => Ok(true),
            Err(BinaryError::FixityMismatch { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, digest: &str) -> BinaryResult<bool> {
        validate_digest(self.algorithm(), digest)?;
        Ok(self.read_lock()?.contains_key(digest))
    }

    fn delete(&self, digest: &str) -> BinaryResult<bool> {
        validate_digest(self.algorithm(), digest)?;
        Ok(self.write_lock()?.remove(digest).is_some())
    }

    fn digests(&self) -> BinaryResult<Vec<String>> {
        let mut out: Vec<String> = self.read_lock()?.keys().cloned().collect();
        out.sort();
        Ok(out)
    }
}
