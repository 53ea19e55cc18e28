use std::fmt;

use lake_types::vocab::{STATE_NS, VERSION_SEPARATOR};
use lake_types::{Term, Triple, TripleSet};

/// Which graphs an operation looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphScope {
    All,
    /// Graphs whose name starts with the prefix.
    Prefix(String),
    /// Current-state graphs only: `repo:state/<uid>` but not
    /// `repo:state/<uid>:<version>`.
    CurrentState,
}

impl GraphScope {
    pub fn contains(&self, graph: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => graph.starts_with(prefix.as_str()),
            Self::CurrentState => graph
                .strip_prefix(STATE_NS)
                .is_some_and(|rest| !rest.contains(VERSION_SEPARATOR)),
        }
    }
}

/// Returns `true` if `object` is the IRI `target` or `target#fragment`.
pub fn references(object: &Term, target: &str) -> bool {
    object.as_iri().is_some_and(|iri| {
        iri == target
            || iri
                .strip_prefix(target)
                .is_some_and(|rest| rest.starts_with('#'))
    })
}

/// A condition checked before any operation of a transaction is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    GraphExists(String),
    GraphAbsent(String),
    /// No graph in scope, other than those excluded, references `target`.
    NoInboundReferences {
        target: String,
        scope: GraphScope,
        excluding: Vec<String>,
    },
    /// The graph exists and holds exactly `triples`.
    GraphUnchanged { graph: String, triples: TripleSet },
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphExists(g) => write!(f, "graph {g} must exist"),
            Self::GraphAbsent(g) => write!(f, "graph {g} must not exist"),
            Self::NoInboundReferences { target, .. } => {
                write!(f, "{target} must have no inbound references")
            }
            Self::GraphUnchanged { graph, .. } => write!(f, "graph {graph} changed concurrently"),
        }
    }
}

/// One mutation inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphOp {
    /// Add triples, creating the graph if needed.
    Insert { graph: String, triples: TripleSet },
    /// Remove triples. Missing triples and graphs are ignored.
    Remove { graph: String, triples: TripleSet },
    /// Remove every triple matching the pattern (`None` is a wildcard).
    RemovePattern {
        graph: String,
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
    },
    /// Create an empty graph if it does not exist.
    Create { graph: String },
    /// Drop a graph and all its triples.
    Drop { graph: String },
}

/// A batch of preconditions and operations applied atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub preconditions: Vec<Precondition>,
    pub ops: Vec<GraphOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, precondition: Precondition) -> &mut Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn insert(&mut self, graph: impl Into<String>, triples: TripleSet) -> &mut Self {
        if !triples.is_empty() {
            self.ops.push(GraphOp::Insert {
                graph: graph.into(),
                triples,
            });
        }
        self
    }

    pub fn insert_one(&mut self, graph: impl Into<String>, triple: Triple) -> &mut Self {
        self.insert(graph, TripleSet::from([triple]))
    }

    pub fn remove(&mut self, graph: impl Into<String>, triples: TripleSet) -> &mut Self {
        if !triples.is_empty() {
            self.ops.push(GraphOp::Remove {
                graph: graph.into(),
                triples,
            });
        }
        self
    }

    pub fn remove_pattern(
        &mut self,
        graph: impl Into<String>,
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
    ) -> &mut Self {
        self.ops.push(GraphOp::RemovePattern {
            graph: graph.into(),
            subject,
            predicate,
            object,
        });
        self
    }

    pub fn create(&mut self, graph: impl Into<String>) -> &mut Self {
        self.ops.push(GraphOp::Create {
            graph: graph.into(),
        });
        self
    }

    pub fn drop_graph(&mut self, graph: impl Into<String>) -> &mut Self {
        self.ops.push(GraphOp::Drop {
            graph: graph.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_state_scope_skips_versions_and_metadata() {
        let scope = GraphScope::CurrentState;
        assert!(scope.contains("repo:state/a/b"));
        assert!(!scope.contains("repo:state/a/b:0190aa"));
        assert!(!scope.contains("repo:meta/a/b"));
        assert!(GraphScope::Prefix("repo:meta/".into()).contains("repo:meta/a"));
        assert!(GraphScope::All.contains("anything"));
    }

    #[test]
    fn references_match_fragments_only() {
        assert!(references(&Term::iri("repo:res/a"), "repo:res/a"));
        assert!(references(&Term::iri("repo:res/a#part"), "repo:res/a"));
        assert!(!references(&Term::iri("repo:res/ab"), "repo:res/a"));
        assert!(!references(&Term::iri("repo:res/a/b"), "repo:res/a"));
        assert!(!references(&Term::literal("repo:res/a"), "repo:res/a"));
    }

    #[test]
    fn builder_skips_empty_inserts() {
        let mut tx = Transaction::new();
        tx.insert("g", TripleSet::new()).remove("g", TripleSet::new());
        assert!(tx.is_empty());
        tx.create("g");
        assert_eq!(tx.ops.len(), 1);
    }
}
