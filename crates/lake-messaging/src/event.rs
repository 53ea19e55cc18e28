use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lake_types::TripleSet;

/// What happened to a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        };
        write!(f, "{s}")
    }
}

/// A change to one resource, composed after the write committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Subject URI of the changed resource.
    pub uri: String,
    pub actor: String,
    pub kind: ChangeKind,
    /// `rdf:type` IRIs of the resource, sorted.
    pub types: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Triples added to the current state.
    pub added: TripleSet,
    /// Triples removed from the current state.
    pub removed: TripleSet,
}

impl ChangeEvent {
    pub fn new(
        uri: impl Into<String>,
        actor: impl Into<String>,
        kind: ChangeKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            uri: uri.into(),
            actor: actor.into(),
            kind,
            types: Vec::new(),
            timestamp,
            added: TripleSet::new(),
            removed: TripleSet::new(),
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.types = types.into_iter().collect();
        self.types.sort();
        self.types.dedup();
        self
    }

    pub fn with_delta(mut self, added: TripleSet, removed: TripleSet) -> Self {
        self.added = added;
        self.removed = removed;
        self
    }
}
