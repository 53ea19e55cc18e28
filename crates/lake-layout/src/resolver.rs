//! UID resolution and legacy pairtree segmentation.

use lake_types::{uid_of, ResourceUris, Term, Uid};

use crate::error::LayoutResult;

/// A UID with its URI triad and, under legacy segmentation, the pairtree
/// node UIDs between it and the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub uid: Uid,
    pub uris: ResourceUris,
    /// Ancestor UIDs, outermost first. Empty unless legacy split is on.
    pub pairtree: Vec<Uid>,
}

impl Resolved {
    /// The resource subject as an IRI term.
    pub fn subject(&self) -> Term {
        Term::iri(&self.uris.subject)
    }

    /// The current-state graph name as an IRI term.
    pub fn state_term(&self) -> Term {
        Term::iri(&self.uris.state_graph)
    }
}

/// Pure mapping from UIDs to graph names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolver {
    legacy_split: bool,
}

impl Resolver {
    pub fn new(legacy_split: bool) -> Self {
        Self { legacy_split }
    }

    pub fn legacy_split(&self) -> bool {
        self.legacy_split
    }

    /// Validate a client UID and resolve it.
    pub fn resolve(&self, raw: &str) -> LayoutResult<Resolved> {
        Ok(self.resolve_uid(&Uid::parse(raw)?))
    }

    /// Resolve an already validated UID.
    pub fn resolve_uid(&self, uid: &Uid) -> Resolved {
        Resolved {
            uid: uid.clone(),
            uris: ResourceUris::resolve(uid),
            pairtree: self.pairtree_segments(uid),
        }
    }

    /// Intermediate node UIDs for `uid`: `a`, `a/b` for `a/b/c`.
    pub fn pairtree_segments(&self, uid: &Uid) -> Vec<Uid> {
        if self.legacy_split {
            uid.ancestors()
        } else {
            Vec::new()
        }
    }
}

/// UID whose current-state graph is named `graph`, if it is one.
pub fn uid_of_state_graph(graph: &str) -> Option<Uid> {
    let path = graph.strip_prefix(lake_types::vocab::STATE_NS)?;
    uid_of(&format!("{}{path}", lake_types::vocab::RES_NS))
}

/// Returns `true` if `term` is `subject` or one of its `#fragment` IRIs.
pub fn is_own_subject(term: &Term, subject: &str) -> bool {
    lake_graph::references(term, subject)
}
