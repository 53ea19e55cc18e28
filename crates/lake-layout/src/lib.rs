//! Resource layout and addressing engine for Lake.
//!
//! Decides where and as what a resource's state, metadata and history live,
//! and whether a mutation is legal under the configured referential
//! integrity policy.
//!
//! # Graph layout
//!
//! For a resource with UID `a/b`:
//!
//! - `repo:state/a/b` -- current state (client triples)
//! - `repo:meta/a/b` -- server-managed metadata
//! - `repo:state/a/b:<version-id>` -- one frozen graph per version
//!
//! # Write pipeline
//!
//! Every write runs `Resolving -> IntegrityChecking -> Versioning ->
//! Committing -> Notifying -> Done` (see [`WritePhase`]). Writers to the
//! same UID are serialized by [`ResourceLocks`]; all graph changes of one
//! write land in a single [`Transaction`](lake_graph::Transaction).
//! Deleting or purging a resource covers everything it contains.

pub mod config;
pub mod describe;
pub mod error;
pub mod integrity;
pub mod locks;
pub mod manager;
pub mod membership;
pub mod migrate;
pub mod resolver;
pub mod version;

pub use config::{IntegrityPolicy, LayoutConfig, LayoutKind};
pub use error::{LayoutError, LayoutResult};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use locks::{ResourceGuard, ResourceLocks};
pub use manager::{
    BinaryContent, LayoutManager, ResourceSnapshot, ResourceStatus, WriteOutcome, WritePhase,
    DEFAULT_ACTOR,
};
pub use membership::MembershipRule;
pub use migrate::MigrationReport;
pub use resolver::{Resolved, Resolver};
pub use version::VersionInfo;
