//! Referential integrity checking.
//!
//! A triple is a managed reference when its object is an IRI in the
//! resource namespace. The reference holds when the target has a
//! current-state graph. Self references and references to the root always
//! hold; pairtree nodes and tombstones have no state graph, so references
//! to them dangle.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use lake_graph::{GraphStore, Precondition};
use lake_types::vocab::RES_NS;
use lake_types::{uid_of, ResourceUris, Triple, TripleSet, Uid};

use crate::config::IntegrityPolicy;
use crate::error::{LayoutError, LayoutResult};

/// Result of checking one write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Triples to store.
    pub retained: TripleSet,
    /// Triples removed under the lenient policy.
    pub dropped: Vec<Triple>,
    /// Existence checks the commit must repeat atomically.
    pub preconditions: Vec<Precondition>,
}

/// Checks managed references against a graph store.
pub struct IntegrityChecker<'a> {
    store: &'a dyn GraphStore,
    policy: IntegrityPolicy,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(store: &'a dyn GraphStore, policy: IntegrityPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    /// Apply the policy to the triples `uid` is about to store.
    pub fn check(&self, uid: &Uid, triples: TripleSet) -> LayoutResult<IntegrityReport> {
        if self.policy == IntegrityPolicy::Off {
            return Ok(IntegrityReport {
                retained: triples,
                ..IntegrityReport::default()
            });
        }

        let mut existence = BTreeMap::new();
        let mut report = IntegrityReport::default();
        let mut required = BTreeSet::new();
        for triple in triples {
            match self.classify(uid, &triple, &mut existence)? {
                Reference::NotManaged | Reference::AlwaysValid => {
                    report.retained.insert(triple);
                }
                Reference::Exists(target) => {
                    required.insert(ResourceUris::resolve(&target).state_graph);
                    report.retained.insert(triple);
                }
                Reference::Dangling => report.dropped.push(triple),
            }
        }

        if !report.dropped.is_empty() {
            match self.policy {
                IntegrityPolicy::Strict => {
                    return Err(LayoutError::ReferentialIntegrityViolation {
                        subject: uid.to_string(),
                        dangling: report
                            .dropped
                            .iter()
                            .map(|t| t.object.to_string())
                            .collect(),
                    });
                }
                _ => {
                    for triple in &report.dropped {
                        info!(uid = %uid, %triple, "dropping dangling reference");
                    }
                }
            }
        }

        report.preconditions = required.into_iter().map(Precondition::GraphExists).collect();
        Ok(report)
    }

    /// Triples of `triples` whose managed reference dangles, regardless of
    /// the policy.
    pub fn dangling(&self, uid: &Uid, triples: &TripleSet) -> LayoutResult<Vec<Triple>> {
        let mut existence = BTreeMap::new();
        let mut out = Vec::new();
        for triple in triples {
            if matches!(
                self.classify(uid, triple, &mut existence)?,
                Reference::Dangling
            ) {
                out.push(triple.clone());
            }
        }
        Ok(out)
    }

    fn classify(
        &self,
        uid: &Uid,
        triple: &Triple,
        existence: &mut BTreeMap<Uid, bool>,
    ) -> LayoutResult<Reference> {
        let Some(iri) = triple.object.as_iri() else {
            return Ok(Reference::NotManaged);
        };
        if !iri.starts_with(RES_NS) {
            return Ok(Reference::NotManaged);
        }
        let Some(target) = uid_of(iri) else {
            return Ok(Reference::Dangling);
        };
        if target.is_root() || target == *uid {
            return Ok(Reference::AlwaysValid);
        }
        let exists = match existence.get(&target) {
            Some(known) => *known,
            None => {
                let state = ResourceUris::resolve(&target).state_graph;
                let found = self.store.graph_exists(&state)?;
                existence.insert(target.clone(), found);
                found
            }
        };
        Ok(if exists {
            Reference::Exists(target)
        } else {
            Reference::Dangling
        })
    }
}

enum Reference {
    NotManaged,
    AlwaysValid,
    Exists(Uid),
    Dangling,
}
