use lake_types::{Triple, TripleSet};

use crate::error::GraphResult;
use crate::transaction::{GraphScope, Transaction};

/// A quad store addressed by graph name.
///
/// Implementations must satisfy these invariants:
/// - [`GraphStore::commit`] is all-or-nothing, including precondition checks.
/// - [`GraphStore::graphs`] reads every requested graph from one snapshot.
/// - A graph exists once created, even when it holds no triples.
/// - Unavailability is reported as an error, never retried internally.
pub trait GraphStore: Send + Sync {
    /// Read one graph. Returns `Ok(None)` if it does not exist.
    fn graph(&self, name: &str) -> GraphResult<Option<TripleSet>>;

    /// Read several graphs from a single consistent snapshot.
    fn graphs(&self, names: &[&str]) -> GraphResult<Vec<Option<TripleSet>>>;

    /// Check whether a graph exists.
    fn graph_exists(&self, name: &str) -> GraphResult<bool> {
        Ok(self.graph(name)?.is_some())
    }

    /// Sorted names of every graph in scope.
    fn graph_names(&self, scope: &GraphScope) -> GraphResult<Vec<String>>;

    /// Triples in scope whose object is `target` or one of its fragments,
    /// paired with the graph holding them.
    fn inbound_references(
        &self,
        target: &str,
        scope: &GraphScope,
    ) -> GraphResult<Vec<(String, Triple)>>;

    /// Apply a transaction atomically.
    fn commit(&self, tx: Transaction) -> GraphResult<()>;
}
