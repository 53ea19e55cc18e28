//! Binary (non-RDF) payload storage for Lake.
//!
//! Payloads are stored once per digest. The digest doubles as the address:
//! [`PairtreeLayout`](lake_crypto::PairtreeLayout) shards it into directory
//! segments under the store root.
//!
//! # Backends
//!
//! - [`FileBinaryStore`] -- filesystem store with a persisted layout descriptor
//! - [`InMemoryBinaryStore`] -- `HashMap`-based store for tests
//!
//! # Store Rules
//!
//! 1. Writes are write-if-absent: storing the same bytes twice is a no-op.
//! 2. Files appear atomically (temporary file, then rename).
//! 3. Reads verify fixity when enabled; a mismatch is never retried.
//! 4. A store written with other layout parameters is refused at open.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use config::{BinaryStoreConfig, LayoutDescriptor};
pub use error::{BinaryError, BinaryResult};
pub use file::FileBinaryStore;
pub use memory::InMemoryBinaryStore;
pub use traits::{BinaryStore, FsckReport};
