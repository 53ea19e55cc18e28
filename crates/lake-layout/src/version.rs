//! Version freezing and lookup.
//!
//! A version is a verbatim copy of a prior current state, stored in its own
//! graph `repo:state/<uid>:<id>` together with two provenance triples about
//! the version itself. The resource's metadata graph lists versions with
//! `fcrepo:hasVersion` and orders them by `fcsystem:versionSequence`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use lake_graph::{GraphStore, Precondition, Transaction};
use lake_types::vocab::{fcrepo, fcsystem, rdf, VERSION_SEPARATOR};
use lake_types::{vocab, Term, TripleSet};

use crate::describe::{datetime, object, objects, parse_datetime, triple};
use crate::error::{LayoutError, LayoutResult};
use crate::resolver::Resolved;

/// One entry of a resource's version list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Generated id (UUID v7).
    pub id: String,
    /// Human label, `v<sequence>`.
    pub label: String,
    /// 1-based position in creation order.
    pub sequence: u64,
    pub created: Option<DateTime<Utc>>,
    /// Name of the version graph.
    pub graph: String,
}

/// A version ready to be staged into a transaction.
#[derive(Clone, Debug)]
pub struct FrozenVersion {
    pub info: VersionInfo,
    /// Prior state plus provenance.
    pub graph_triples: TripleSet,
    /// Triples appended to the resource's metadata graph.
    pub metadata: TripleSet,
}

/// Freeze `prior_state` as the next version of a resource.
pub fn freeze(
    resolved: &Resolved,
    prior_state: &TripleSet,
    metadata: &TripleSet,
    now: DateTime<Utc>,
) -> FrozenVersion {
    let sequence = list(resolved, metadata)
        .last()
        .map_or(1, |latest| latest.sequence + 1);
    let id = Uuid::now_v7().to_string();
    let graph = resolved.uris.version_graph(&id);
    let label = format!("v{sequence}");
    let version = Term::iri(&graph);
    let subject = resolved.subject();

    let mut graph_triples = prior_state.clone();
    graph_triples.insert(triple(&version, fcsystem::STATE_OF, subject.clone()));
    graph_triples.insert(triple(&version, fcrepo::CREATED, datetime(now)));

    let metadata = TripleSet::from([
        triple(&subject, fcrepo::HAS_VERSION, version.clone()),
        triple(&version, rdf::TYPE, vocab::iri(fcrepo::VERSION)),
        triple(&version, fcrepo::HAS_VERSION_LABEL, Term::literal(&label)),
        triple(&version, fcrepo::CREATED, datetime(now)),
        triple(&version, fcsystem::VERSION_SEQUENCE, Term::integer(sequence)),
    ]);

    FrozenVersion {
        info: VersionInfo {
            id,
            label,
            sequence,
            created: Some(now),
            graph,
        },
        graph_triples,
        metadata,
    }
}

/// Add a frozen version to a transaction. The version graph must not exist
/// yet, so an id is never reused.
pub fn stage(frozen: &FrozenVersion, resolved: &Resolved, tx: &mut Transaction) {
    tx.require(Precondition::GraphAbsent(frozen.info.graph.clone()))
        .create(frozen.info.graph.clone())
        .insert(frozen.info.graph.clone(), frozen.graph_triples.clone())
        .insert(
            resolved.uris.metadata_graph.clone(),
            frozen.metadata.clone(),
        );
}

/// Versions listed in a metadata graph, oldest first.
pub fn list(resolved: &Resolved, metadata: &TripleSet) -> Vec<VersionInfo> {
    let subject = resolved.subject();
    let prefix = format!("{}{VERSION_SEPARATOR}", resolved.uris.state_graph);
    let mut versions: Vec<VersionInfo> = objects(metadata, &subject, fcrepo::HAS_VERSION)
        .filter_map(|version| {
            let graph = version.as_iri()?;
            let id = graph.strip_prefix(&prefix)?.to_string();
            let sequence = object(metadata, version, fcsystem::VERSION_SEQUENCE)
                .and_then(Term::as_lexical)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let label = object(metadata, version, fcrepo::HAS_VERSION_LABEL)
                .and_then(Term::as_lexical)
                .map_or_else(|| id.clone(), str::to_string);
            let created = object(metadata, version, fcrepo::CREATED).and_then(parse_datetime);
            Some(VersionInfo {
                id,
                label,
                sequence,
                created,
                graph: graph.to_string(),
            })
        })
        .collect();
    versions.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
    versions
}

/// Look a version up by id or label.
pub fn find(resolved: &Resolved, metadata: &TripleSet, version: &str) -> LayoutResult<VersionInfo> {
    list(resolved, metadata)
        .into_iter()
        .find(|v| v.id == version || v.label == version)
        .ok_or_else(|| LayoutError::VersionNotFound {
            uid: resolved.uid.clone(),
            version: version.to_string(),
        })
}

/// The frozen state of a version, without its provenance triples.
pub fn load(
    store: &dyn GraphStore,
    resolved: &Resolved,
    info: &VersionInfo,
) -> LayoutResult<TripleSet> {
    let graph = store
        .graph(&info.graph)?
        .ok_or_else(|| LayoutError::VersionNotFound {
            uid: resolved.uid.clone(),
            version: info.id.clone(),
        })?;
    let version = Term::iri(&info.graph);
    Ok(graph.into_iter().filter(|t| t.subject != version).collect())
}

#[cfg(test)]
mod tests {
    use lake_graph::InMemoryGraphStore;

    use super::*;
    use crate::resolver::Resolver;

    fn resolved() -> Resolved {
        Resolver::default().resolve("books/moby").unwrap()
    }

    fn state(title: &str) -> TripleSet {
        TripleSet::from([triple(
            &resolved().subject(),
            "http://purl.org/dc/elements/1.1/title",
            Term::literal(title),
        )])
    }

    #[test]
    fn freeze_copies_state_and_adds_provenance() {
        let r = resolved();
        let frozen = freeze(&r, &state("Moby Dick"), &TripleSet::new(), Utc::now());
        assert_eq!(frozen.info.sequence, 1);
        assert_eq!(frozen.info.label, "v1");
        assert!(frozen.info.graph.starts_with("repo:state/books/moby:"));
        assert!(frozen.graph_triples.is_superset(&state("Moby Dick")));
        assert_eq!(frozen.graph_triples.len(), 3);
    }

    #[test]
    fn sequences_increase_and_list_is_ordered() {
        let r = resolved();
        let store = InMemoryGraphStore::new();
        let mut metadata = TripleSet::new();
        let mut ids = Vec::new();
        for n in 0..3 {
            let frozen = freeze(&r, &state(&format!("draft {n}")), &metadata, Utc::now());
            let mut tx = Transaction::new();
            stage(&frozen, &r, &mut tx);
            store.commit(tx).unwrap();
            metadata.extend(frozen.metadata);
            ids.push(frozen.info.id);
        }

        let versions = list(&r, &metadata);
        let sequences: Vec<u64> = versions.iter().map(|v| v.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(versions.iter().map(|v| v.id.clone()).collect::<Vec<_>>(), ids);

        let second = find(&r, &metadata, "v2").unwrap();
        assert_eq!(load(&store, &r, &second).unwrap(), state("draft 1"));
        assert_eq!(find(&r, &metadata, &ids[0]).unwrap().label, "v1");
    }

    #[test]
    fn unknown_version_is_reported() {
        let r = resolved();
        assert!(matches!(
            find(&r, &TripleSet::new(), "v9"),
            Err(LayoutError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn staged_graph_cannot_be_reused() {
        let r = resolved();
        let store = InMemoryGraphStore::new();
        let frozen = freeze(&r, &state("x"), &TripleSet::new(), Utc::now());
        let mut tx = Transaction::new();
        stage(&frozen, &r, &mut tx);
        store.commit(tx.clone()).unwrap();
        assert!(store.commit(tx).is_err());
    }
}
