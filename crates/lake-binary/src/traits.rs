use lake_crypto::DigestAlgorithm;

use crate::error::{BinaryError, BinaryResult};

/// Outcome of verifying every stored payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsckReport {
    pub checked: usize,
    /// Digests whose bytes no longer match.
    pub corrupt: Vec<String>,
}

impl FsckReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// Content-addressed payload store.
///
/// All implementations must satisfy these invariants:
/// - `put` returns the digest of the bytes under the store's algorithm.
/// - Storing identical bytes twice, even concurrently, stores them once.
/// - A payload is never visible half-written.
pub trait BinaryStore: Send + Sync {
    /// Algorithm used to address payloads.
    fn algorithm(&self) -> DigestAlgorithm;

    /// Store bytes and return their digest.
    fn put(&self, data: &[u8]) -> BinaryResult<String>;

    /// Read the bytes stored under a digest.
    fn get(&self, digest: &str) -> BinaryResult<Vec<u8>>;

    /// Returns `true` if the stored bytes still hash to `digest`.
    fn verify(&self, digest: &str) -> BinaryResult<bool>;

    fn exists(&self, digest: &str) -> BinaryResult<bool>;

    /// Remove a payload. Returns `true` if it existed.
    fn delete(&self, digest: &str) -> BinaryResult<bool>;

    /// Every stored digest, sorted.
    fn digests(&self) -> BinaryResult<Vec<String>>;

    /// Verify every stored payload.
    fn fsck(&self) -> BinaryResult<FsckReport> {
        let mut report = FsckReport::default();
        for digest in self.digests()? {
            report.checked += 1;
            if !self.verify(&digest)? {
                report.corrupt.push(digest);
            }
        }
        Ok(report)
    }
}

/// Reject anything that is not a lowercase hex digest of the right length.
pub(crate) fn validate_digest(algorithm: DigestAlgorithm, digest: &str) -> BinaryResult<()> {
    let well_formed = digest.len() == algorithm.hex_len()
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(BinaryError::InvalidDigest(digest.to_string()))
    }
}
