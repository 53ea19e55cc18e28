use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::CryptoError;

const READ_CHUNK: usize = 64 * 1024;

/// Digest algorithms accepted by `uuid.algo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [Self; 5] = [
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    /// Configuration name (`sha1`, `sha256`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha224 => 56,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|algo| algo.name() == wanted)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(algo: DigestAlgorithm) -> Self {
        algo.name().to_string()
    }
}

/// Content hasher bound to one algorithm.
///
/// Produces lowercase hex digests. The same bytes always produce the same
/// digest, which is what makes binary storage deduplicate by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: DigestAlgorithm,
}

impl ContentHasher {
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hasher for a configured algorithm name.
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        Ok(Self::new(name.parse()?))
    }

    /// The algorithm this hasher uses.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Hex digest of raw bytes.
    pub fn hash(&self, data: &[u8]) -> String {
        match self.algorithm {
            DigestAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            DigestAlgorithm::Sha224 => hex::encode(Sha224::digest(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Sha384 => hex::encode(Sha384::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    /// Hex digest of everything a reader yields.
    pub fn hash_reader<R: Read>(&self, reader: R) -> io::Result<String> {
        match self.algorithm {
            DigestAlgorithm::Sha1 => stream::<Sha1, R>(reader),
            DigestAlgorithm::Sha224 => stream::<Sha224, R>(reader),
            DigestAlgorithm::Sha256 => stream::<Sha256, R>(reader),
            DigestAlgorithm::Sha384 => stream::<Sha384, R>(reader),
            DigestAlgorithm::Sha512 => stream::<Sha512, R>(reader),
        }
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &str) -> bool {
        self.hash(data) == expected
    }

    /// URN form used in metadata: `urn:sha1:<hex>`.
    pub fn urn(&self, digest: &str) -> String {
        format!("urn:{}:{digest}", self.algorithm.name())
    }

    /// Extract the hex digest from a URN produced by [`Self::urn`].
    pub fn digest_from_urn<'a>(&self, urn: &'a str) -> Option<&'a str> {
        urn.strip_prefix("urn:")?
            .strip_prefix(self.algorithm.name())?
            .strip_prefix(':')
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

fn stream<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
