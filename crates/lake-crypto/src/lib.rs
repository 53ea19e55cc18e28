//! Content addressing for Lake.
//!
//! Provides the configurable SHA-family digest engine and the pairtree path
//! builder that shards digests into directory segments.
//!
//! Digests wrap the RustCrypto `sha1` and `sha2` crates.

pub mod digest;
pub mod error;
pub mod pairtree;

pub use digest::{ContentHasher, DigestAlgorithm};
pub use error::CryptoError;
pub use pairtree::PairtreeLayout;
