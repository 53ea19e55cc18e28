use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lake_types::{Triple, TripleSet};

use crate::error::{GraphError, GraphResult};
use crate::traits::GraphStore;
use crate::transaction::{references, GraphOp, GraphScope, Precondition, Transaction};

const SNAPSHOT_FORMAT: u32 = 1;

type Graphs = BTreeMap<String, TripleSet>;

#[derive(Deserialize)]
struct Snapshot {
    format: u32,
    graphs: Graphs,
}

/// In-memory named-graph store.
///
/// Graphs live in a `BTreeMap` behind a `RwLock`. When opened with a
/// snapshot path, every successful commit rewrites the snapshot through a
/// temporary file and an atomic rename before the new state becomes visible.
pub struct InMemoryGraphStore {
    graphs: RwLock<Graphs>,
    snapshot: Option<PathBuf>,
}

impl InMemoryGraphStore {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(Graphs::new()),
            snapshot: None,
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if present.
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref().to_path_buf();
        let graphs = if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            if snapshot.format != SNAPSHOT_FORMAT {
                return Err(GraphError::Serialization(format!(
                    "unsupported snapshot format {} in {}",
                    snapshot.format,
                    path.display()
                )));
            }
            info!(
                path = %path.display(),
                graphs = snapshot.graphs.len(),
                "loaded graph snapshot"
            );
            snapshot.graphs
        } else {
            Graphs::new()
        };
        Ok(Self {
            graphs: RwLock::new(graphs),
            snapshot: Some(path),
        })
    }

    /// Number of graphs currently stored.
    pub fn len(&self) -> GraphResult<usize> {
        Ok(self.read_lock()?.len())
    }

    /// Returns `true` if no graph exists.
    pub fn is_empty(&self) -> GraphResult<bool> {
        Ok(self.read_lock()?.is_empty())
    }

    fn read_lock(&self) -> GraphResult<std::sync::RwLockReadGuard<'_, Graphs>> {
        self.graphs
            .read()
            .map_err(|_| GraphError::Unavailable("graph lock poisoned".into()))
    }

    fn write_lock(&self) -> GraphResult<std::sync::RwLockWriteGuard<'_, Graphs>> {
        self.graphs
            .write()
            .map_err(|_| GraphError::Unavailable("graph lock poisoned".into()))
    }

    fn persist(&self, graphs: &Graphs) -> GraphResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let body = serde_json::to_vec(&SnapshotRef {
            format: SNAPSHOT_FORMAT,
            graphs,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| GraphError::Io(e.error))?;
        debug!(path = %path.display(), bytes = body.len(), "persisted graph snapshot");
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format: u32,
    graphs: &'a Graphs,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn inbound_in<'a>(
    graphs: &'a Graphs,
    target: &'a str,
    scope: &'a GraphScope,
    excluding: &'a [String],
) -> impl Iterator<Item = (&'a String, &'a Triple)> + 'a {
    graphs
        .iter()
        .filter(move |(name, _)| {
            scope.contains(name) && !excluding.iter().any(|e| e == *name)
        })
        .flat_map(move |(name, triples)| {
            triples
                .iter()
                .filter(move |t| references(&t.object, target))
                .map(move |t| (name, t))
        })
}

fn check(graphs: &Graphs, precondition: &Precondition) -> bool {
    match precondition {
        Precondition::GraphExists(g) => graphs.contains_key(g),
        Precondition::GraphAbsent(g) => !graphs.contains_key(g),
        Precondition::NoInboundReferences {
            target,
            scope,
            excluding,
        } => inbound_in(graphs, target, scope, excluding).next().is_none(),
        Precondition::GraphUnchanged { graph, triples } => graphs.get(graph) == Some(triples),
    }
}

fn apply(graphs: &mut Graphs, op: GraphOp) {
    match op {
        GraphOp::Insert { graph, triples } => {
            graphs.entry(graph).or_default().extend(triples);
        }
        GraphOp::Remove { graph, triples } => {
            if let Some(existing) = graphs.get_mut(&graph) {
                for t in &triples {
                    existing.remove(t);
                }
            }
        }
        GraphOp::RemovePattern {
            graph,
            subject,
            predicate,
            object,
        } => {
            if let Some(existing) = graphs.get_mut(&graph) {
                existing.retain(|t| {
                    !t.matches(subject.as_ref(), predicate.as_ref(), object.as_ref())
                });
            }
        }
        GraphOp::Create { graph } => {
            graphs.entry(graph).or_default();
        }
        GraphOp::Drop { graph } => {
            graphs.remove(&graph);
        }
    }
}

impl GraphStore for InMemoryGraphStore {
    fn graph(&self, name: &str) -> GraphResult<Option<TripleSet>> {
        Ok(self.read_lock()?.get(name).cloned())
    }

    fn graphs(&self, names: &[&str]) -> GraphResult<Vec<Option<TripleSet>>> {
        let map = self.read_lock()?;
        Ok(names.iter().map(|n| map.get(*n).cloned()).collect())
    }

    fn graph_exists(&self, name: &str) -> GraphResult<bool> {
        Ok(self.read_lock()?.contains_key(name))
    }

    fn graph_names(&self, scope: &GraphScope) -> GraphResult<Vec<String>> {
        Ok(self
            .read_lock()?
            .keys()
            .filter(|name| scope.contains(name))
            .cloned()
            .collect())
    }

    fn inbound_references(
        &self,
        target: &str,
        scope: &GraphScope,
    ) -> GraphResult<Vec<(String, Triple)>> {
        let map = self.read_lock()?;
        Ok(inbound_in(&map, target, scope, &[])
            .map(|(g, t)| (g.clone(), t.clone()))
            .collect())
    }

    fn commit(&self, tx: Transaction) -> GraphResult<()> {
        let mut map = self.write_lock()?;
        if let Some(failed) = tx.preconditions.iter().find(|p| !check(&map, p)) {
            debug!(precondition = %failed, "transaction rejected");
            return Err(GraphError::PreconditionFailed(failed.clone()));
        }

        let op_count = tx.ops.len();
        let mut next = map.clone();
        for op in tx.ops {
            apply(&mut next, op);
        }
        self.persist(&next)?;
        *map = next;
        debug!(ops = op_count, "transaction committed");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read_lock().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryGraphStore")
            .field("graph_count", &count)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}
