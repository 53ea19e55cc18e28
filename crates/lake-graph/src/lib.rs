//! Named-graph storage for Lake.
//!
//! The layout engine never talks to a triple store directly. It reads graphs
//! through the [`GraphStore`] trait and writes through [`Transaction`]s that
//! either apply in full or not at all.
//!
//! # Backends
//!
//! - [`InMemoryGraphStore`] -- `BTreeMap`-based store for tests and embedding,
//!   with optional JSON snapshot persistence for the CLI
//!
//! # Store Rules
//!
//! 1. Preconditions are checked and operations applied under one write lock.
//! 2. A failed precondition or persistence error leaves the store untouched.
//! 3. Multi-graph reads come from a single consistent snapshot.
//! 4. The store never interprets graph names beyond [`GraphScope`] filtering.

pub mod error;
pub mod memory;
pub mod traits;
pub mod transaction;

pub use error::{GraphError, GraphResult};
pub use memory::InMemoryGraphStore;
pub use traits::GraphStore;
pub use transaction::{references, GraphOp, GraphScope, Precondition, Transaction};
