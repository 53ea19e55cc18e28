//! High-level SDK for Lake.
//!
//! [`RepositoryConfig`] is the TOML configuration of a repository and
//! [`Repository`] wires the graph store, binary store, layout manager and
//! messenger together. This is the main entry point for applications
//! embedding Lake.

pub mod config;
pub mod error;
pub mod repository;

pub use config::{MessagingConfig, RepositoryConfig, StoreConfig, UuidConfig};
pub use error::{SdkError, SdkResult};
pub use repository::Repository;

// Re-export key types
pub use lake_binary::FsckReport;
pub use lake_crypto::DigestAlgorithm;
pub use lake_layout::{
    BinaryContent, IntegrityPolicy, LayoutError, MigrationReport, ResourceSnapshot,
    ResourceStatus, VersionInfo, WriteOutcome, DEFAULT_ACTOR,
};
pub use lake_messaging::{ChangeEvent, ChangeKind, HandlerRegistry};
pub use lake_types::{Term, Triple, TripleSet, Uid};
