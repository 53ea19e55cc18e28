//! The layout manager: resource lifecycle over the graph and binary stores.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use lake_binary::BinaryStore;
use lake_crypto::ContentHasher;
use lake_graph::{references, GraphError, GraphScope, GraphStore, Precondition, Transaction};
use lake_messaging::{ChangeEvent, ChangeKind, EventSink};
use lake_types::ntriples::canonical_bytes;
use lake_types::vocab::{self, ebucore, fcrepo, fcsystem, ldp, premis, rdf, META_NS};
use lake_types::{uid_of, ResourceUris, Term, Triple, TripleSet, Uid};

use crate::config::{IntegrityPolicy, LayoutConfig};
use crate::describe::{
    datetime, has_type, object, objects, triple, type_triples, types, BINARY_TYPES,
    RDF_SOURCE_TYPES,
};
use crate::error::{LayoutError, LayoutResult};
use crate::integrity::IntegrityChecker;
use crate::locks::{ResourceGuard, ResourceLocks};
use crate::membership::MembershipRule;
use crate::resolver::{is_own_subject, uid_of_state_graph, Resolved, Resolver};
use crate::version::{self, FrozenVersion, VersionInfo};

/// Actor recorded when the caller does not name one.
pub const DEFAULT_ACTOR: &str = "BypassAdmin";

/// Metadata predicates describing a binary payload.
const DESCRIPTION_PREDICATES: [&str; 3] = [
    premis::HAS_MESSAGE_DIGEST,
    premis::HAS_SIZE,
    ebucore::HAS_MIME_TYPE,
];

// ---------------------------------------------------------------------------
// WritePhase
// ---------------------------------------------------------------------------

/// Phases of a single write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum WritePhase {
    Resolving,
    IntegrityChecking,
    /// Only writes that replace or remove a current state pass here.
    Versioning,
    Committing,
    Notifying,
    Done,
    Aborted,
}

impl WritePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::IntegrityChecking => "integrity_checking",
            Self::Versioning => "versioning",
            Self::Committing => "committing",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns `true` if a write may move from `self` to `next`.
    pub fn can_advance_to(&self, next: WritePhase) -> bool {
        use WritePhase::*;
        match (*self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Resolving, IntegrityChecking)
            | (IntegrityChecking, Versioning)
            | (IntegrityChecking, Committing)
            | (Versioning, Committing)
            | (Committing, Notifying)
            | (Notifying, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traces one write through its phases.
struct WriteTrace {
    op: &'static str,
    uid: String,
    phase: WritePhase,
}

impl WriteTrace {
    fn begin(op: &'static str, uid: &str) -> Self {
        debug!(op, uid, phase = %WritePhase::Resolving, "write started");
        Self {
            op,
            uid: uid.to_string(),
            phase: WritePhase::Resolving,
        }
    }

    fn enter(&mut self, next: WritePhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal write transition {} -> {next}",
            self.phase
        );
        debug!(op = self.op, uid = %self.uid, from = %self.phase, to = %next, "write phase");
        self.phase = next;
    }

    fn abort(&mut self, err: &LayoutError) {
        warn!(
            op = self.op,
            uid = %self.uid,
            phase = %self.phase,
            error = %err,
            "write aborted"
        );
        self.phase = WritePhase::Aborted;
    }
}

// ---------------------------------------------------------------------------
// Public result types
// ---------------------------------------------------------------------------

/// What a UID currently names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Absent,
    Live,
    /// Deleted; metadata and versions remain.
    Tombstone,
    /// A legacy intermediate node with metadata but no state.
    Pairtree,
}

/// Current state and metadata of a resource, read from one snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub uid: Uid,
    pub uris: ResourceUris,
    pub state: TripleSet,
    pub metadata: TripleSet,
}

impl ResourceSnapshot {
    /// `rdf:type` IRIs from both graphs.
    pub fn types(&self) -> BTreeSet<String> {
        let subject = Term::iri(&self.uris.subject);
        collect_types(&subject, [&self.state, &self.metadata])
    }
}

/// Summary of a committed write.
#[derive(Clone, Debug)]
pub struct WriteOutcome {
    pub uid: Uid,
    pub kind: ChangeKind,
    /// Version frozen by this write.
    pub version: Option<VersionInfo>,
    /// Triples removed by the lenient integrity policy.
    pub dropped: Vec<Triple>,
    /// Events handed to the sink, in order.
    pub events: Vec<ChangeEvent>,
}

/// A binary payload with its description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryContent {
    pub digest: String,
    pub mime: Option<String>,
    pub data: Vec<u8>,
}

/// A resource read under its lock.
struct Loaded {
    resolved: Resolved,
    state: Option<TripleSet>,
    metadata: Option<TripleSet>,
    status: ResourceStatus,
}

impl Loaded {
    fn state(&self) -> TripleSet {
        self.state.clone().unwrap_or_default()
    }

    fn metadata(&self) -> TripleSet {
        self.metadata.clone().unwrap_or_default()
    }

    fn is_binary(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| has_type(m, &self.resolved.subject(), fcrepo::BINARY))
    }
}

/// Where a new resource hangs in the containment tree.
struct Placement {
    /// Nearest live ancestor, or the root.
    parent: Uid,
    /// Nearest existing ancestor of any kind, or the root.
    anchor: Uid,
    /// Pairtree nodes to create, outermost first.
    nodes: Vec<Uid>,
}

/// A resource and everything it contains, each read under its lock.
struct Subtree<'a> {
    top: Loaded,
    /// Live and deleted descendants in UID order.
    descendants: Vec<Loaded>,
    /// Pairtree nodes below `top`.
    nodes: Vec<Loaded>,
    _guards: Vec<ResourceGuard<'a>>,
}

impl Subtree<'_> {
    /// `top` first, then its descendants.
    fn resources(&self) -> impl Iterator<Item = &Loaded> + '_ {
        std::iter::once(&self.top).chain(&self.descendants)
    }

    /// Every resource and pairtree node in the subtree.
    fn all_nodes(&self) -> impl Iterator<Item = &Resolved> + '_ {
        self.resources().chain(&self.nodes).map(|l| &l.resolved)
    }

    /// Fail the commit if anything gained a child since it was read.
    fn require_unchanged(&self, tx: &mut Transaction) {
        for loaded in self.resources().chain(&self.nodes) {
            tx.require(Precondition::GraphUnchanged {
                graph: loaded.resolved.uris.metadata_graph.clone(),
                triples: loaded.metadata(),
            });
        }
    }
}

/// A resource losing its references to removed resources.
struct Referrer {
    resolved: Resolved,
    /// Current state as read.
    state: TripleSet,
    removed: TripleSet,
}

// ---------------------------------------------------------------------------
// LayoutManager
// ---------------------------------------------------------------------------

/// Owns every resource mutation.
///
/// All graph changes of one write are committed as a single transaction.
/// Writes to the same UID are serialized; events are published after the
/// resource lock is released.
pub struct LayoutManager {
    pub(crate) store: Arc<dyn GraphStore>,
    pub(crate) binaries: Arc<dyn BinaryStore>,
    pub(crate) hasher: ContentHasher,
    pub(crate) config: LayoutConfig,
    pub(crate) policy: RwLock<IntegrityPolicy>,
    /// Held shared by every write until it commits, exclusively by policy
    /// migration.
    pub(crate) writes: RwLock<()>,
    pub(crate) locks: ResourceLocks,
    pub(crate) resolver: Resolver,
    pub(crate) sink: Option<Arc<dyn EventSink>>,
}

impl LayoutManager {
    /// Digests use the binary store's algorithm.
    pub fn new(
        store: Arc<dyn GraphStore>,
        binaries: Arc<dyn BinaryStore>,
        config: LayoutConfig,
    ) -> Self {
        let hasher = ContentHasher::new(binaries.algorithm());
        Self {
            store,
            binaries,
            hasher,
            policy: RwLock::new(config.referential_integrity),
            writes: RwLock::new(()),
            resolver: Resolver::new(config.legacy_ptree_split),
            config,
            locks: ResourceLocks::new(),
            sink: None,
        }
    }

    /// Publish committed changes to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn binaries(&self) -> &Arc<dyn BinaryStore> {
        &self.binaries
    }

    /// The active referential integrity policy.
    pub fn policy(&self) -> IntegrityPolicy {
        match self.policy.read() {
            Ok(policy) => *policy,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    // -- bootstrap ----------------------------------------------------------

    /// Create the root resource if it does not exist and record the active
    /// policy. Returns `true` if the root was created.
    pub fn bootstrap(&self, actor: &str) -> LayoutResult<bool> {
        let root = self.resolver.resolve_uid(&Uid::root());
        let _guard = self.locks.lock(&root.uid)?;
        if self.store.graph_exists(&root.uris.state_graph)? {
            debug!("repository root already present");
            return Ok(false);
        }

        let now = Utc::now();
        let subject = root.subject();
        let state = TripleSet::new();
        let mut metadata = type_triples(&subject, RDF_SOURCE_TYPES);
        metadata.insert(triple(&subject, rdf::TYPE, vocab::iri(fcrepo::ROOT)));
        metadata.extend(self.provenance(&subject, actor, now));
        metadata.insert(triple(&subject, premis::HAS_MESSAGE_DIGEST, self.state_digest(&state)));
        metadata.insert(triple(&root.state_term(), fcsystem::STATE_OF, subject.clone()));
        metadata.insert(self.policy_triple(self.policy()));

        let mut tx = Transaction::new();
        tx.require(Precondition::GraphAbsent(root.uris.state_graph.clone()))
            .create(root.uris.state_graph.clone())
            .insert(root.uris.metadata_graph.clone(), metadata);
        self.store.commit(tx)?;
        info!(policy = %self.policy(), "bootstrapped repository root");
        Ok(true)
    }

    // -- reads ---------------------------------------------------------------

    /// What `uid` currently names.
    pub fn status(&self, uid: &str) -> LayoutResult<ResourceStatus> {
        let resolved = self.resolve_read(uid)?;
        Ok(self.load(resolved)?.status)
    }

    /// State and metadata of a live resource. An empty UID names the root.
    pub fn get(&self, uid: &str) -> LayoutResult<ResourceSnapshot> {
        let loaded = self.load(self.resolve_read(uid)?)?;
        match loaded.status {
            ResourceStatus::Live => Ok(ResourceSnapshot {
                uid: loaded.resolved.uid,
                uris: loaded.resolved.uris,
                state: loaded.state.unwrap_or_default(),
                metadata: loaded.metadata.unwrap_or_default(),
            }),
            ResourceStatus::Tombstone => Err(LayoutError::Tombstoned(loaded.resolved.uid)),
            _ => Err(LayoutError::NotFound(loaded.resolved.uid)),
        }
    }

    /// Resources and pairtree nodes directly contained by `uid`.
    pub fn children(&self, uid: &str) -> LayoutResult<Vec<Uid>> {
        let loaded = self.load(self.resolve_read(uid)?)?;
        let Some(metadata) = &loaded.metadata else {
            return Err(LayoutError::NotFound(loaded.resolved.uid));
        };
        Ok(contained(&loaded.resolved.subject(), metadata)
            .into_iter()
            .collect())
    }

    /// Membership triples a direct or indirect container asserts for its
    /// live children. Empty for any other live resource.
    pub fn membership(&self, uid: &str) -> LayoutResult<TripleSet> {
        let container = self.get(uid)?;
        let subject = Term::iri(&container.uris.subject);
        let Some(rule) = MembershipRule::of(&subject, &container.state) else {
            return Ok(TripleSet::new());
        };
        let mut members = TripleSet::new();
        for child in objects(&container.metadata, &subject, ldp::CONTAINS)
            .filter_map(Term::as_iri)
            .filter_map(uid_of)
        {
            let loaded = self.load(self.resolver.resolve_uid(&child))?;
            if loaded.status == ResourceStatus::Live {
                members.extend(rule.members(&loaded.resolved.subject(), &loaded.state()));
            }
        }
        debug!(uid = %container.uid, members = members.len(), "derived membership");
        Ok(members)
    }

    /// Versions of a live or deleted resource, oldest first.
    pub fn versions(&self, uid: &str) -> LayoutResult<Vec<VersionInfo>> {
        let loaded = self.load(self.resolve_read(uid)?)?;
        match loaded.status {
            ResourceStatus::Live | ResourceStatus::Tombstone => {
                Ok(version::list(&loaded.resolved, &loaded.metadata()))
            }
            _ => Err(LayoutError::NotFound(loaded.resolved.uid)),
        }
    }

    /// Frozen state of one version, addressed by id or label.
    pub fn get_version(&self, uid: &str, version: &str) -> LayoutResult<TripleSet> {
        let loaded = self.load(self.resolve_read(uid)?)?;
        if loaded.metadata.is_none() {
            return Err(LayoutError::NotFound(loaded.resolved.uid));
        }
        let info = version::find(&loaded.resolved, &loaded.metadata(), version)?;
        version::load(self.store.as_ref(), &loaded.resolved, &info)
    }

    /// Payload of a binary resource, verified against its digest when the
    /// store checks fixity.
    pub fn get_binary(&self, uid: &str) -> LayoutResult<BinaryContent> {
        let loaded = self.load(self.resolve_read(uid)?)?;
        match loaded.status {
            ResourceStatus::Live => {}
            ResourceStatus::Tombstone => return Err(LayoutError::Tombstoned(loaded.resolved.uid)),
            _ => return Err(LayoutError::NotFound(loaded.resolved.uid)),
        }
        if !loaded.is_binary() {
            return Err(LayoutError::Conflict(format!(
                "{} is not a binary resource",
                loaded.resolved.uid
            )));
        }
        let metadata = loaded.metadata();
        let subject = loaded.resolved.subject();
        let digest = object(&metadata, &subject, premis::HAS_MESSAGE_DIGEST)
            .and_then(Term::as_iri)
            .and_then(|urn| self.hasher.digest_from_urn(urn))
            .ok_or_else(|| {
                LayoutError::Conflict(format!("{} has no payload digest", loaded.resolved.uid))
            })?
            .to_string();
        let mime = object(&metadata, &subject, ebucore::HAS_MIME_TYPE)
            .and_then(Term::as_lexical)
            .map(str::to_string);
        let data = self.binaries.get(&digest)?;
        Ok(BinaryContent { digest, mime, data })
    }

    // -- writes --------------------------------------------------------------

    /// Create a new RDF source.
    pub fn create(&self, uid: &str, triples: TripleSet, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("create", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.load(resolved)?;
            match loaded.status {
                ResourceStatus::Live => Err(LayoutError::AlreadyExists(loaded.resolved.uid)),
                ResourceStatus::Tombstone => Err(LayoutError::Tombstoned(loaded.resolved.uid)),
                ResourceStatus::Absent | ResourceStatus::Pairtree => {
                    self.create_locked(trace, loaded, triples, actor)
                }
            }
        })
    }

    /// Replace the state of an existing RDF source, freezing the prior
    /// state as a version.
    pub fn update(&self, uid: &str, triples: TripleSet, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("update", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.require_live(self.load(resolved)?)?;
            self.replace_state(trace, loaded, triples, actor)
        })
    }

    /// Create `uid` if it is free, update it otherwise.
    pub fn put(&self, uid: &str, triples: TripleSet, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("put", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.load(resolved)?;
            match loaded.status {
                ResourceStatus::Live => self.replace_state(trace, loaded, triples, actor),
                ResourceStatus::Tombstone => Err(LayoutError::Tombstoned(loaded.resolved.uid)),
                ResourceStatus::Absent | ResourceStatus::Pairtree => {
                    self.create_locked(trace, loaded, triples, actor)
                }
            }
        })
    }

    /// Make the state of `version` current again. The current state is
    /// frozen first.
    pub fn revert_to_version(
        &self,
        uid: &str,
        version: &str,
        actor: &str,
    ) -> LayoutResult<WriteOutcome> {
        self.run("revert", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.require_live(self.load(resolved)?)?;
            let info = version::find(&loaded.resolved, &loaded.metadata(), version)?;
            let state = version::load(self.store.as_ref(), &loaded.resolved, &info)?;
            self.replace_state(trace, loaded, state, actor)
        })
    }

    /// Delete a live resource, leaving a tombstone. Live descendants are
    /// buried in the same transaction with a pointer to the tombstone.
    pub fn delete(&self, uid: &str, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("delete", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.require_live(self.load(resolved)?)?;
            let tree = self.subtree(loaded)?;
            let top = &tree.top.resolved;
            let top_subject = top.subject();
            let doomed: Vec<&Loaded> = tree
                .resources()
                .filter(|r| r.status == ResourceStatus::Live)
                .collect();
            let targets: Vec<&Resolved> = doomed.iter().map(|r| &r.resolved).collect();

            trace.enter(WritePhase::IntegrityChecking);
            let now = Utc::now();
            let mut tx = Transaction::new();
            tree.require_unchanged(&mut tx);
            let referrers = self.stage_inbound(top, &targets, &mut tx, actor, now)?;

            trace.enter(WritePhase::Versioning);
            let frozen: Vec<FrozenVersion> = doomed
                .iter()
                .map(|r| version::freeze(&r.resolved, &r.state(), &r.metadata(), now))
                .collect();

            trace.enter(WritePhase::Committing);
            for (resource, version) in doomed.iter().zip(&frozen) {
                let pointer = (resource.resolved.uid != top.uid).then_some(&top_subject);
                self.stage_burial(&mut tx, resource, version, pointer, actor, now);
            }
            self.commit_guarded(tx, top, &targets)?;

            let mut events = Vec::with_capacity(doomed.len() + referrers.len());
            for resource in &doomed {
                let uris = &resource.resolved.uris;
                let prior = resource.state();
                let mut types =
                    collect_types(&resource.resolved.subject(), [&prior, &resource.metadata()]);
                types.insert(fcsystem::TOMBSTONE.to_string());
                events.push(
                    ChangeEvent::new(&uris.subject, actor, ChangeKind::Delete, now)
                        .with_types(types)
                        .with_delta(TripleSet::new(), prior),
                );
            }
            events.extend(self.referrer_events(&referrers, actor, now));
            let version = frozen.into_iter().next().map(|f| f.info);
            info!(
                uid = %top.uid,
                buried = doomed.len() - 1,
                version = ?version.as_ref().map(|v| &v.id),
                "deleted resource"
            );

            Ok(WriteOutcome {
                uid: top.uid.clone(),
                kind: ChangeKind::Delete,
                version,
                dropped: dropped(&referrers),
                events,
            })
        })
    }

    /// Remove every trace of a live or deleted resource and of everything
    /// it contains: state, metadata, versions and containment triples.
    /// Binary payloads no other resource describes are deleted from the
    /// binary store.
    pub fn purge(&self, uid: &str, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("purge", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.load(resolved)?;
            if !matches!(
                loaded.status,
                ResourceStatus::Live | ResourceStatus::Tombstone
            ) {
                return Err(LayoutError::NotFound(loaded.resolved.uid));
            }
            let tree = self.subtree(loaded)?;
            let top = &tree.top.resolved;
            let targets: Vec<&Resolved> = tree.resources().map(|r| &r.resolved).collect();
            let payloads: Vec<String> = tree
                .resources()
                .filter(|r| r.is_binary())
                .filter_map(|r| {
                    object(&r.metadata(), &r.resolved.subject(), premis::HAS_MESSAGE_DIGEST)
                        .and_then(Term::as_iri)
                        .map(str::to_string)
                })
                .collect();

            trace.enter(WritePhase::IntegrityChecking);
            let now = Utc::now();
            let mut tx = Transaction::new();
            tree.require_unchanged(&mut tx);
            let referrers = self.stage_inbound(top, &targets, &mut tx, actor, now)?;

            trace.enter(WritePhase::Committing);
            let mut purged_metadata = Vec::new();
            for resolved in tree.all_nodes() {
                let versions = self.store.graph_names(&GraphScope::Prefix(format!(
                    "{}{}",
                    resolved.uris.state_graph,
                    vocab::VERSION_SEPARATOR
                )))?;
                tx.drop_graph(resolved.uris.state_graph.clone())
                    .drop_graph(resolved.uris.metadata_graph.clone());
                for graph in versions {
                    tx.drop_graph(graph);
                }
                purged_metadata.push(resolved.uris.metadata_graph.clone());
            }
            let subject = top.subject();
            for ancestor in std::iter::once(Uid::root()).chain(top.uid.ancestors()) {
                let meta = ResourceUris::resolve(&ancestor).metadata_graph;
                for predicate in [ldp::CONTAINS, fcrepo::CONTAINS] {
                    tx.remove_pattern(
                        meta.clone(),
                        None,
                        Some(vocab::iri(predicate)),
                        Some(subject.clone()),
                    );
                }
            }
            self.commit_guarded(tx, top, &targets)?;

            for urn in &payloads {
                self.release_payload(urn, &purged_metadata);
            }

            let mut events = Vec::with_capacity(targets.len() + referrers.len());
            for resource in tree.resources() {
                let uris = &resource.resolved.uris;
                let prior = resource.state();
                let types =
                    collect_types(&resource.resolved.subject(), [&prior, &resource.metadata()]);
                events.push(
                    ChangeEvent::new(&uris.subject, actor, ChangeKind::Delete, now)
                        .with_types(types)
                        .with_delta(TripleSet::new(), prior),
                );
            }
            events.extend(self.referrer_events(&referrers, actor, now));
            info!(uid = %top.uid, contained = targets.len() - 1, "purged resource");

            Ok(WriteOutcome {
                uid: top.uid.clone(),
                kind: ChangeKind::Delete,
                version: None,
                dropped: dropped(&referrers),
                events,
            })
        })
    }

    /// Bring a deleted resource back from its latest version. A buried
    /// descendant can only come back once the resource that buried it is
    /// live again; resurrection never cascades.
    pub fn resurrect(&self, uid: &str, actor: &str) -> LayoutResult<WriteOutcome> {
        self.run("resurrect", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.load(resolved)?;
            match loaded.status {
                ResourceStatus::Tombstone => {}
                ResourceStatus::Live => {
                    return Err(LayoutError::AlreadyExists(loaded.resolved.uid));
                }
                _ => return Err(LayoutError::NotFound(loaded.resolved.uid)),
            }
            let resolved = &loaded.resolved;
            let subject = resolved.subject();
            let metadata = loaded.metadata();
            let burier = object(&metadata, &subject, fcsystem::TOMBSTONE_POINTER)
                .and_then(Term::as_iri)
                .and_then(uid_of);
            if let Some(burier) = burier {
                if self.status(burier.as_str())? == ResourceStatus::Tombstone {
                    return Err(LayoutError::Tombstoned(burier));
                }
            }
            let latest = version::list(resolved, &metadata).pop().ok_or_else(|| {
                LayoutError::VersionNotFound {
                    uid: resolved.uid.clone(),
                    version: "latest".into(),
                }
            })?;
            let state = version::load(self.store.as_ref(), resolved, &latest)?;

            trace.enter(WritePhase::IntegrityChecking);
            let report = self.checker().check(&resolved.uid, state)?;

            trace.enter(WritePhase::Committing);
            let now = Utc::now();
            let mut tx = Transaction::new();
            tx.require(Precondition::GraphAbsent(resolved.uris.state_graph.clone()));
            for precondition in report.preconditions {
                tx.require(precondition);
            }
            tx.create(resolved.uris.state_graph.clone())
                .insert(resolved.uris.state_graph.clone(), report.retained.clone())
                .remove_pattern(
                    resolved.uris.metadata_graph.clone(),
                    Some(subject.clone()),
                    Some(vocab::iri(rdf::TYPE)),
                    Some(vocab::iri(fcsystem::TOMBSTONE)),
                )
                .remove_pattern(
                    resolved.uris.metadata_graph.clone(),
                    Some(subject.clone()),
                    Some(vocab::iri(fcsystem::TOMBSTONE_POINTER)),
                    None,
                )
                .insert_one(
                    resolved.uris.metadata_graph.clone(),
                    triple(&resolved.state_term(), fcsystem::STATE_OF, subject.clone()),
                );
            if !loaded.is_binary() {
                self.set_digest(&mut tx, resolved, self.state_digest(&report.retained));
            }
            self.touch(&mut tx, resolved, actor, now);
            self.store.commit(tx)?;

            let mut types = collect_types(&subject, [&report.retained, &metadata]);
            types.remove(fcsystem::TOMBSTONE);
            let event = ChangeEvent::new(&resolved.uris.subject, actor, ChangeKind::Create, now)
                .with_types(types)
                .with_delta(report.retained, TripleSet::new());
            info!(uid = %resolved.uid, version = %latest.id, "resurrected resource");

            Ok(WriteOutcome {
                uid: resolved.uid.clone(),
                kind: ChangeKind::Create,
                version: None,
                dropped: report.dropped,
                events: vec![event],
            })
        })
    }

    /// Store `data` in the binary store and describe it as the binary
    /// resource `uid`, creating or replacing it.
    pub fn put_binary(
        &self,
        uid: &str,
        data: &[u8],
        mime: &str,
        actor: &str,
    ) -> LayoutResult<WriteOutcome> {
        self.run("put_binary", uid, |trace| {
            let resolved = self.resolver.resolve(uid)?;
            let _guard = self.locks.lock(&resolved.uid)?;
            let loaded = self.load(resolved)?;
            let existing = match loaded.status {
                ResourceStatus::Tombstone => {
                    return Err(LayoutError::Tombstoned(loaded.resolved.uid));
                }
                ResourceStatus::Live if !loaded.is_binary() => {
                    return Err(LayoutError::Conflict(format!(
                        "{} is an RDF source, not a binary",
                        loaded.resolved.uid
                    )));
                }
                ResourceStatus::Live => true,
                ResourceStatus::Absent | ResourceStatus::Pairtree => false,
            };
            let placement = if existing {
                None
            } else {
                Some(self.place(&loaded.resolved)?)
            };
            let resolved = &loaded.resolved;
            let subject = resolved.subject();
            let metadata = loaded.metadata();

            trace.enter(WritePhase::IntegrityChecking);
            let digest = self.binaries.put(data)?;
            let description = TripleSet::from([
                triple(
                    &subject,
                    premis::HAS_MESSAGE_DIGEST,
                    Term::iri(self.hasher.urn(&digest)),
                ),
                triple(&subject, premis::HAS_SIZE, Term::integer(data.len() as u64)),
                triple(&subject, ebucore::HAS_MIME_TYPE, Term::literal(mime)),
            ]);
            let now = Utc::now();
            let mut tx = Transaction::new();

            let (kind, frozen) = if existing {
                trace.enter(WritePhase::Versioning);
                let prior = loaded.state.clone().unwrap_or_default();
                let frozen = version::freeze(resolved, &prior, &metadata, now);
                trace.enter(WritePhase::Committing);
                tx.require(Precondition::GraphExists(resolved.uris.state_graph.clone()));
                version::stage(&frozen, resolved, &mut tx);
                for predicate in DESCRIPTION_PREDICATES {
                    tx.remove_pattern(
                        resolved.uris.metadata_graph.clone(),
                        Some(subject.clone()),
                        Some(vocab::iri(predicate)),
                        None,
                    );
                }
                tx.insert(resolved.uris.metadata_graph.clone(), description);
                self.touch(&mut tx, resolved, actor, now);
                (ChangeKind::Update, Some(frozen.info))
            } else {
                trace.enter(WritePhase::Committing);
                let mut meta = type_triples(&subject, BINARY_TYPES);
                meta.extend(description);
                self.stage_new(
                    &mut tx,
                    &loaded,
                    placement.as_ref(),
                    TripleSet::new(),
                    meta,
                    actor,
                    now,
                );
                (ChangeKind::Create, None)
            };
            self.store.commit(tx)?;
            debug!(uid = %resolved.uid, %digest, bytes = data.len(), "stored binary");

            let mut types = collect_types(&subject, [&metadata]);
            types.extend(BINARY_TYPES.iter().map(|t| t.to_string()));
            let event =
                ChangeEvent::new(&resolved.uris.subject, actor, kind, now).with_types(types);
            Ok(WriteOutcome {
                uid: resolved.uid.clone(),
                kind,
                version: frozen,
                dropped: Vec::new(),
                events: vec![event],
            })
        })
    }

    // -- pipeline ------------------------------------------------------------

    fn run(
        &self,
        op: &'static str,
        uid: &str,
        write: impl FnOnce(&mut WriteTrace) -> LayoutResult<WriteOutcome>,
    ) -> LayoutResult<WriteOutcome> {
        let mut trace = WriteTrace::begin(op, uid);
        let result = {
            let _barrier = self.writes.read().unwrap_or_else(PoisonError::into_inner);
            write(&mut trace)
        };
        match result {
            Ok(outcome) => {
                trace.enter(WritePhase::Notifying);
                self.notify(&outcome.events);
                trace.enter(WritePhase::Done);
                Ok(outcome)
            }
            Err(err) => {
                trace.abort(&err);
                Err(err)
            }
        }
    }

    pub(crate) fn notify(&self, events: &[ChangeEvent]) {
        let Some(sink) = &self.sink else {
            return;
        };
        for event in events {
            sink.publish(event);
        }
    }

    fn create_locked(
        &self,
        trace: &mut WriteTrace,
        loaded: Loaded,
        triples: TripleSet,
        actor: &str,
    ) -> LayoutResult<WriteOutcome> {
        let resolved = &loaded.resolved;
        validate_triples(resolved, &triples)?;
        let placement = self.place(resolved)?;

        trace.enter(WritePhase::IntegrityChecking);
        let report = self.checker().check(&resolved.uid, triples)?;

        trace.enter(WritePhase::Committing);
        let now = Utc::now();
        let subject = resolved.subject();
        let mut metadata = type_triples(&subject, RDF_SOURCE_TYPES);
        metadata.insert(triple(
            &subject,
            premis::HAS_MESSAGE_DIGEST,
            self.state_digest(&report.retained),
        ));
        let mut tx = Transaction::new();
        for precondition in report.preconditions {
            tx.require(precondition);
        }
        self.stage_new(
            &mut tx,
            &loaded,
            Some(&placement),
            report.retained.clone(),
            metadata.clone(),
            actor,
            now,
        );
        self.store.commit(tx)?;
        info!(uid = %resolved.uid, parent = %placement.parent, "created resource");

        let event = ChangeEvent::new(&resolved.uris.subject, actor, ChangeKind::Create, now)
            .with_types(collect_types(&subject, [&report.retained, &metadata]))
            .with_delta(report.retained, TripleSet::new());
        Ok(WriteOutcome {
            uid: resolved.uid.clone(),
            kind: ChangeKind::Create,
            version: None,
            dropped: report.dropped,
            events: vec![event],
        })
    }

    /// Stage the graphs of a new resource: state, metadata with provenance,
    /// containment and pairtree nodes.
    #[allow(clippy::too_many_arguments)]
    fn stage_new(
        &self,
        tx: &mut Transaction,
        loaded: &Loaded,
        placement: Option<&Placement>,
        state: TripleSet,
        mut metadata: TripleSet,
        actor: &str,
        now: DateTime<Utc>,
    ) {
        let resolved = &loaded.resolved;
        let subject = resolved.subject();
        let meta_graph = resolved.uris.metadata_graph.clone();

        tx.require(Precondition::GraphAbsent(resolved.uris.state_graph.clone()))
            .create(resolved.uris.state_graph.clone())
            .insert(resolved.uris.state_graph.clone(), state);

        if loaded.status == ResourceStatus::Pairtree {
            tx.remove_pattern(
                meta_graph.clone(),
                Some(subject.clone()),
                Some(vocab::iri(rdf::TYPE)),
                Some(vocab::iri(fcrepo::PAIRTREE)),
            );
        }
        tx.remove_pattern(
            meta_graph.clone(),
            Some(subject.clone()),
            Some(vocab::iri(fcrepo::HAS_PARENT)),
            None,
        );

        metadata.extend(self.provenance(&subject, actor, now));
        metadata.insert(triple(&resolved.state_term(), fcsystem::STATE_OF, subject.clone()));

        if let Some(placement) = placement {
            let parent = ResourceUris::resolve(&placement.parent);
            let parent_subject = Term::iri(&parent.subject);
            metadata.insert(triple(&subject, fcrepo::HAS_PARENT, parent_subject.clone()));
            if !placement.parent.is_root() {
                tx.require(Precondition::GraphExists(parent.state_graph.clone()));
            }
            tx.insert_one(
                parent.metadata_graph,
                triple(&parent_subject, ldp::CONTAINS, subject.clone()),
            );
            self.stage_pairtree(tx, resolved, placement);
        }
        tx.insert(meta_graph, metadata);
    }

    /// Link missing intermediate nodes between the placement anchor and the
    /// new resource with `fcrepo:contains`.
    fn stage_pairtree(&self, tx: &mut Transaction, resolved: &Resolved, placement: &Placement) {
        if !self.resolver.legacy_split() {
            return;
        }
        let mut previous = placement.anchor.clone();
        for node in &placement.nodes {
            let uris = ResourceUris::resolve(node);
            let node_subject = Term::iri(&uris.subject);
            let previous_uris = ResourceUris::resolve(&previous);
            let previous_subject = Term::iri(&previous_uris.subject);
            tx.require(Precondition::GraphAbsent(uris.state_graph.clone()))
                .insert_one(
                    previous_uris.metadata_graph,
                    triple(&previous_subject, fcrepo::CONTAINS, node_subject.clone()),
                )
                .insert(
                    uris.metadata_graph,
                    TripleSet::from([
                        triple(&node_subject, rdf::TYPE, vocab::iri(fcrepo::PAIRTREE)),
                        triple(&node_subject, fcrepo::HAS_PARENT, previous_subject),
                    ]),
                );
            debug!(node = %node, "staged pairtree node");
            previous = node.clone();
        }
        if previous != placement.parent {
            let previous_uris = ResourceUris::resolve(&previous);
            tx.insert_one(
                previous_uris.metadata_graph,
                triple(
                    &Term::iri(&previous_uris.subject),
                    fcrepo::CONTAINS,
                    resolved.subject(),
                ),
            );
        }
    }

    /// Replace the current state of a live resource with `triples`.
    fn replace_state(
        &self,
        trace: &mut WriteTrace,
        loaded: Loaded,
        triples: TripleSet,
        actor: &str,
    ) -> LayoutResult<WriteOutcome> {
        let resolved = &loaded.resolved;
        if loaded.is_binary() {
            return Err(LayoutError::Conflict(format!(
                "{} is a binary; replace its payload instead",
                resolved.uid
            )));
        }
        validate_triples(resolved, &triples)?;

        trace.enter(WritePhase::IntegrityChecking);
        let report = self.checker().check(&resolved.uid, triples)?;

        trace.enter(WritePhase::Versioning);
        let now = Utc::now();
        let prior = loaded.state.clone().unwrap_or_default();
        let metadata = loaded.metadata();
        let frozen = version::freeze(resolved, &prior, &metadata, now);

        trace.enter(WritePhase::Committing);
        let removed: TripleSet = prior.difference(&report.retained).cloned().collect();
        let added: TripleSet = report.retained.difference(&prior).cloned().collect();
        let mut tx = Transaction::new();
        tx.require(Precondition::GraphExists(resolved.uris.state_graph.clone()));
        for precondition in report.preconditions {
            tx.require(precondition);
        }
        version::stage(&frozen, resolved, &mut tx);
        tx.remove(resolved.uris.state_graph.clone(), removed.clone())
            .insert(resolved.uris.state_graph.clone(), added.clone());
        self.set_digest(&mut tx, resolved, self.state_digest(&report.retained));
        self.touch(&mut tx, resolved, actor, now);
        self.store.commit(tx)?;
        info!(
            uid = %resolved.uid,
            version = %frozen.info.label,
            added = added.len(),
            removed = removed.len(),
            "updated resource"
        );

        let subject = resolved.subject();
        let event = ChangeEvent::new(&resolved.uris.subject, actor, ChangeKind::Update, now)
            .with_types(collect_types(&subject, [&report.retained, &metadata]))
            .with_delta(added, removed);
        Ok(WriteOutcome {
            uid: resolved.uid.clone(),
            kind: ChangeKind::Update,
            version: Some(frozen.info),
            dropped: report.dropped,
            events: vec![event],
        })
    }

    // -- helpers -------------------------------------------------------------

    pub(crate) fn checker(&self) -> IntegrityChecker<'_> {
        IntegrityChecker::new(self.store.as_ref(), self.policy())
    }

    /// Resolve a UID for reading; an empty string or `/` names the root.
    fn resolve_read(&self, uid: &str) -> LayoutResult<Resolved> {
        if uid.is_empty() || uid == "/" {
            Ok(self.resolver.resolve_uid(&Uid::root()))
        } else {
            self.resolver.resolve(uid)
        }
    }

    /// Read state and metadata of a resource from one snapshot.
    fn load(&self, resolved: Resolved) -> LayoutResult<Loaded> {
        let mut graphs = self
            .store
            .graphs(&[&resolved.uris.state_graph, &resolved.uris.metadata_graph])?
            .into_iter();
        let state = graphs.next().flatten();
        let metadata = graphs.next().flatten();
        let status = status_of(&resolved.subject(), state.as_ref(), metadata.as_ref());
        Ok(Loaded {
            resolved,
            state,
            metadata,
            status,
        })
    }

    fn require_live(&self, loaded: Loaded) -> LayoutResult<Loaded> {
        match loaded.status {
            ResourceStatus::Live => Ok(loaded),
            ResourceStatus::Tombstone => Err(LayoutError::Tombstoned(loaded.resolved.uid)),
            _ => Err(LayoutError::NotFound(loaded.resolved.uid)),
        }
    }

    /// Find the parent and the missing pairtree nodes of a new resource.
    fn place(&self, resolved: &Resolved) -> LayoutResult<Placement> {
        let ancestors = resolved.uid.ancestors();
        let uris: Vec<ResourceUris> = ancestors.iter().map(ResourceUris::resolve).collect();
        let names: Vec<&str> = uris
            .iter()
            .flat_map(|u| [u.state_graph.as_str(), u.metadata_graph.as_str()])
            .collect();
        let graphs = self.store.graphs(&names)?;
        let statuses: Vec<ResourceStatus> = uris
            .iter()
            .zip(graphs.chunks(2))
            .map(|(u, pair)| {
                status_of(&Term::iri(&u.subject), pair[0].as_ref(), pair[1].as_ref())
            })
            .collect();

        let mut parent = Uid::root();
        for (ancestor, status) in ancestors.iter().zip(&statuses).rev() {
            match status {
                ResourceStatus::Live => {
                    parent = ancestor.clone();
                    break;
                }
                ResourceStatus::Tombstone => {
                    return Err(LayoutError::Tombstoned(ancestor.clone()));
                }
                ResourceStatus::Absent | ResourceStatus::Pairtree => {}
            }
        }

        let existing = statuses
            .iter()
            .rposition(|status| *status != ResourceStatus::Absent);
        let (anchor, first_missing) = match existing {
            Some(idx) => (ancestors[idx].clone(), idx + 1),
            None => (Uid::root(), 0),
        };
        let nodes = resolved.pairtree.iter().skip(first_missing).cloned().collect();
        Ok(Placement {
            parent,
            anchor,
            nodes,
        })
    }

    /// Lock and read every descendant of `top`, ancestors before
    /// descendants so concurrent cascades cannot deadlock.
    fn subtree(&self, top: Loaded) -> LayoutResult<Subtree<'_>> {
        let mut found = BTreeSet::new();
        let mut pending: Vec<Uid> = contained(&top.resolved.subject(), &top.metadata())
            .into_iter()
            .collect();
        while let Some(uid) = pending.pop() {
            if !found.insert(uid.clone()) {
                continue;
            }
            let uris = ResourceUris::resolve(&uid);
            if let Some(metadata) = self.store.graph(&uris.metadata_graph)? {
                pending.extend(contained(&Term::iri(&uris.subject), &metadata));
            }
        }

        let mut guards = Vec::with_capacity(found.len());
        for uid in &found {
            guards.push(self.locks.lock(uid)?);
        }
        let mut tree = Subtree {
            top,
            descendants: Vec::new(),
            nodes: Vec::new(),
            _guards: guards,
        };
        for uid in &found {
            let loaded = self.load(self.resolver.resolve_uid(uid))?;
            match loaded.status {
                ResourceStatus::Live | ResourceStatus::Tombstone => tree.descendants.push(loaded),
                ResourceStatus::Pairtree => tree.nodes.push(loaded),
                ResourceStatus::Absent => return Err(containment_changed(&tree.top)),
            }
        }
        let grew = tree.resources().chain(&tree.nodes).any(|l| {
            contained(&l.resolved.subject(), &l.metadata())
                .iter()
                .any(|child| !found.contains(child))
        });
        if grew {
            return Err(containment_changed(&tree.top));
        }
        debug!(uid = %tree.top.resolved.uid, descendants = found.len(), "collected subtree");
        Ok(tree)
    }

    /// Freeze and drop the state of a live resource. The resource that
    /// started the delete gets the tombstone type; resources it contains
    /// get a pointer to it.
    fn stage_burial(
        &self,
        tx: &mut Transaction,
        resource: &Loaded,
        frozen: &FrozenVersion,
        pointer: Option<&Term>,
        actor: &str,
        now: DateTime<Utc>,
    ) {
        let resolved = &resource.resolved;
        let subject = resolved.subject();
        let marker = match pointer {
            None => triple(&subject, rdf::TYPE, vocab::iri(fcsystem::TOMBSTONE)),
            Some(top) => triple(&subject, fcsystem::TOMBSTONE_POINTER, top.clone()),
        };
        tx.require(Precondition::GraphExists(resolved.uris.state_graph.clone()));
        version::stage(frozen, resolved, tx);
        tx.drop_graph(resolved.uris.state_graph.clone())
            .remove_pattern(
                resolved.uris.metadata_graph.clone(),
                Some(resolved.state_term()),
                Some(vocab::iri(fcsystem::STATE_OF)),
                None,
            )
            .insert_one(resolved.uris.metadata_graph.clone(), marker);
        self.touch(tx, resolved, actor, now);
    }

    /// Apply the integrity policy to references pointing at resources that
    /// are about to disappear. Under `lenient` the referring states are
    /// edited in the same transaction, with their digest and modification
    /// time refreshed.
    fn stage_inbound(
        &self,
        top: &Resolved,
        targets: &[&Resolved],
        tx: &mut Transaction,
        actor: &str,
        now: DateTime<Utc>,
    ) -> LayoutResult<Vec<Referrer>> {
        let mut excluding: Vec<String> =
            targets.iter().map(|r| r.uris.state_graph.clone()).collect();
        let referrers = match self.policy() {
            IntegrityPolicy::Off => return Ok(Vec::new()),
            IntegrityPolicy::Strict => {
                let inbound = self.inbound(targets)?;
                if !inbound.is_empty() {
                    return Err(violation(top, inbound));
                }
                Vec::new()
            }
            IntegrityPolicy::Lenient => {
                let referrers = self.referrers(targets)?;
                for referrer in &referrers {
                    self.stage_cleanup(tx, referrer, actor, now);
                    excluding.push(referrer.resolved.uris.state_graph.clone());
                }
                referrers
            }
        };
        for target in targets {
            tx.require(Precondition::NoInboundReferences {
                target: target.uris.subject.clone(),
                scope: GraphScope::CurrentState,
                excluding: excluding.clone(),
            });
        }
        Ok(referrers)
    }

    /// References to `targets` from current states outside them.
    fn inbound(&self, targets: &[&Resolved]) -> LayoutResult<Vec<(String, Triple)>> {
        let mut inbound = Vec::new();
        for target in targets {
            inbound.extend(
                self.store
                    .inbound_references(&target.uris.subject, &GraphScope::CurrentState)?
                    .into_iter()
                    .filter(|(graph, _)| !targets.iter().any(|t| t.uris.state_graph == *graph)),
            );
        }
        Ok(inbound)
    }

    /// Resources outside `targets` whose current state references them.
    fn referrers(&self, targets: &[&Resolved]) -> LayoutResult<Vec<Referrer>> {
        let graphs: BTreeSet<String> = self
            .inbound(targets)?
            .into_iter()
            .map(|(graph, _)| graph)
            .collect();
        let mut referrers = Vec::with_capacity(graphs.len());
        for graph in graphs {
            let Some(uid) = uid_of_state_graph(&graph) else {
                continue;
            };
            let Some(state) = self.store.graph(&graph)? else {
                continue;
            };
            let removed: TripleSet = state
                .iter()
                .filter(|t| targets.iter().any(|r| references(&t.object, &r.uris.subject)))
                .cloned()
                .collect();
            if !removed.is_empty() {
                referrers.push(Referrer {
                    resolved: self.resolver.resolve_uid(&uid),
                    state,
                    removed,
                });
            }
        }
        Ok(referrers)
    }

    /// Cut a referrer's references, guarded against concurrent edits.
    fn stage_cleanup(
        &self,
        tx: &mut Transaction,
        referrer: &Referrer,
        actor: &str,
        now: DateTime<Utc>,
    ) {
        let resolved = &referrer.resolved;
        let remaining: TripleSet = referrer.state.difference(&referrer.removed).cloned().collect();
        tx.require(Precondition::GraphUnchanged {
            graph: resolved.uris.state_graph.clone(),
            triples: referrer.state.clone(),
        })
        .remove(resolved.uris.state_graph.clone(), referrer.removed.clone());
        self.set_digest(tx, resolved, self.state_digest(&remaining));
        self.touch(tx, resolved, actor, now);
    }

    /// Commit a transaction that may carry no-inbound-references
    /// preconditions. Their failure is an integrity violation under
    /// `strict` and a write conflict otherwise.
    fn commit_guarded(
        &self,
        tx: Transaction,
        top: &Resolved,
        targets: &[&Resolved],
    ) -> LayoutResult<()> {
        match self.store.commit(tx) {
            Ok(()) => Ok(()),
            Err(GraphError::PreconditionFailed(Precondition::NoInboundReferences { .. }))
                if self.policy() == IntegrityPolicy::Strict =>
            {
                Err(violation(top, self.inbound(targets)?))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Update events for resources whose references were cut.
    fn referrer_events(
        &self,
        referrers: &[Referrer],
        actor: &str,
        now: DateTime<Utc>,
    ) -> Vec<ChangeEvent> {
        referrers
            .iter()
            .map(|referrer| {
                let uris = &referrer.resolved.uris;
                info!(
                    uid = %referrer.resolved.uid,
                    removed = referrer.removed.len(),
                    "removed references to deleted resource"
                );
                ChangeEvent::new(&uris.subject, actor, ChangeKind::Update, now)
                    .with_types(self.current_types(uris))
                    .with_delta(TripleSet::new(), referrer.removed.clone())
            })
            .collect()
    }

    /// Types of a resource for event composition. Read failures only cost
    /// the event its types.
    pub(crate) fn current_types(&self, uris: &ResourceUris) -> BTreeSet<String> {
        match self
            .store
            .graphs(&[&uris.state_graph, &uris.metadata_graph])
        {
            Ok(graphs) => {
                let subject = Term::iri(&uris.subject);
                let mut types = BTreeSet::new();
                for graph in graphs.iter().flatten() {
                    types.extend(collect_types(&subject, [graph]));
                }
                types
            }
            Err(err) => {
                warn!(uri = %uris.subject, error = %err, "could not read resource types");
                BTreeSet::new()
            }
        }
    }

    /// Delete a binary payload once no metadata graph refers to it.
    fn release_payload(&self, urn: &str, purged: &[String]) {
        let still_used = self
            .store
            .inbound_references(urn, &GraphScope::Prefix(META_NS.to_string()))
            .map(|refs| refs.iter().any(|(graph, _)| !purged.contains(graph)));
        let Some(digest) = self.hasher.digest_from_urn(urn) else {
            return;
        };
        match still_used {
            Ok(true) => debug!(%digest, "binary payload still referenced"),
            Ok(false) => match self.binaries.delete(digest) {
                Ok(_) => debug!(%digest, "deleted binary payload"),
                Err(err) => warn!(%digest, error = %err, "could not delete binary payload"),
            },
            Err(err) => warn!(%digest, error = %err, "could not check payload references"),
        }
    }

    /// `urn:<algo>:<hex>` of the canonical serialization of `state`.
    pub(crate) fn state_digest(&self, state: &TripleSet) -> Term {
        Term::iri(self.hasher.urn(&self.hasher.hash(&canonical_bytes(state))))
    }

    fn provenance(&self, subject: &Term, actor: &str, now: DateTime<Utc>) -> TripleSet {
        TripleSet::from([
            triple(subject, fcrepo::CREATED, datetime(now)),
            triple(subject, fcrepo::CREATED_BY, Term::literal(actor)),
            triple(subject, fcrepo::LAST_MODIFIED, datetime(now)),
            triple(subject, fcrepo::LAST_MODIFIED_BY, Term::literal(actor)),
        ])
    }

    /// Refresh `lastModified` and `lastModifiedBy`.
    pub(crate) fn touch(
        &self,
        tx: &mut Transaction,
        resolved: &Resolved,
        actor: &str,
        now: DateTime<Utc>,
    ) {
        let subject = resolved.subject();
        let graph = resolved.uris.metadata_graph.clone();
        for predicate in [fcrepo::LAST_MODIFIED, fcrepo::LAST_MODIFIED_BY] {
            tx.remove_pattern(
                graph.clone(),
                Some(subject.clone()),
                Some(vocab::iri(predicate)),
                None,
            );
        }
        tx.insert(
            graph,
            TripleSet::from([
                triple(&subject, fcrepo::LAST_MODIFIED, datetime(now)),
                triple(&subject, fcrepo::LAST_MODIFIED_BY, Term::literal(actor)),
            ]),
        );
    }

    pub(crate) fn set_digest(&self, tx: &mut Transaction, resolved: &Resolved, digest: Term) {
        let subject = resolved.subject();
        tx.remove_pattern(
            resolved.uris.metadata_graph.clone(),
            Some(subject.clone()),
            Some(vocab::iri(premis::HAS_MESSAGE_DIGEST)),
            None,
        )
        .insert_one(
            resolved.uris.metadata_graph.clone(),
            triple(&subject, premis::HAS_MESSAGE_DIGEST, digest),
        );
    }
}

impl fmt::Debug for LayoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutManager")
            .field("algorithm", &self.hasher.algorithm())
            .field("policy", &self.policy())
            .field("legacy_ptree_split", &self.resolver.legacy_split())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

fn status_of(
    subject: &Term,
    state: Option<&TripleSet>,
    metadata: Option<&TripleSet>,
) -> ResourceStatus {
    match (state, metadata) {
        (Some(_), _) => ResourceStatus::Live,
        (None, Some(m)) if has_type(m, subject, fcsystem::TOMBSTONE) => ResourceStatus::Tombstone,
        (None, Some(m)) if object(m, subject, fcsystem::TOMBSTONE_POINTER).is_some() => {
            ResourceStatus::Tombstone
        }
        (None, Some(m)) if has_type(m, subject, fcrepo::PAIRTREE) => ResourceStatus::Pairtree,
        _ => ResourceStatus::Absent,
    }
}

/// UIDs `subject` contains through `ldp:contains` or `fcrepo:contains`.
fn contained(subject: &Term, metadata: &TripleSet) -> BTreeSet<Uid> {
    objects(metadata, subject, ldp::CONTAINS)
        .chain(objects(metadata, subject, fcrepo::CONTAINS))
        .filter_map(Term::as_iri)
        .filter_map(uid_of)
        .collect()
}

fn containment_changed(top: &Loaded) -> LayoutError {
    LayoutError::Conflict(format!("containment below {} changed", top.resolved.uid))
}

fn dropped(referrers: &[Referrer]) -> Vec<Triple> {
    referrers
        .iter()
        .flat_map(|r| r.removed.iter().cloned())
        .collect()
}

fn collect_types<'a>(
    subject: &Term,
    graphs: impl IntoIterator<Item = &'a TripleSet>,
) -> BTreeSet<String> {
    graphs
        .into_iter()
        .flat_map(|graph| types(graph, subject).map(str::to_string))
        .collect()
}

/// Client triples must be about the resource and use no server-managed
/// terms.
fn validate_triples(resolved: &Resolved, triples: &TripleSet) -> LayoutResult<()> {
    for t in triples {
        if !is_own_subject(&t.subject, &resolved.uris.subject) {
            return Err(LayoutError::InvalidTriple(format!(
                "{t} is not about {} or one of its fragments",
                resolved.uris.subject
            )));
        }
        if vocab::is_server_managed(&t.predicate, &t.object) {
            return Err(LayoutError::InvalidTriple(format!(
                "{t} uses a server-managed term"
            )));
        }
    }
    Ok(())
}

fn violation(resolved: &Resolved, inbound: Vec<(String, Triple)>) -> LayoutError {
    LayoutError::ReferentialIntegrityViolation {
        subject: resolved.uid.to_string(),
        dangling: inbound
            .into_iter()
            .map(|(graph, t)| format!("{graph}: {t}"))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lake_binary::InMemoryBinaryStore;
    use lake_crypto::DigestAlgorithm;
    use lake_graph::InMemoryGraphStore;

    use super::*;

    const TITLE: &str = "http://purl.org/dc/elements/1.1/title";
    const RELATED: &str = "http://purl.org/dc/terms/relation";

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl EventSink for Recorder {
        fn publish(&self, event: &ChangeEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<(String, ChangeKind)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.uri.clone(), e.kind))
                .collect()
        }
    }

    fn manager_with(policy: IntegrityPolicy, split: bool) -> (LayoutManager, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = LayoutConfig {
            referential_integrity: policy,
            legacy_ptree_split: split,
            ..LayoutConfig::default()
        };
        let manager = LayoutManager::new(
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(InMemoryBinaryStore::new(DigestAlgorithm::Sha1)),
            config,
        )
        .with_sink(recorder.clone());
        assert!(manager.bootstrap(DEFAULT_ACTOR).unwrap());
        (manager, recorder)
    }

    fn manager(policy: IntegrityPolicy) -> LayoutManager {
        manager_with(policy, false).0
    }

    fn subject(uid: &str) -> Term {
        Term::iri(format!("repo:res/{uid}"))
    }

    fn titled(uid: &str, title: &str) -> TripleSet {
        TripleSet::from([Triple::new(
            subject(uid),
            Term::iri(TITLE),
            Term::literal(title),
        )])
    }

    fn link(from: &str, to: &str) -> Triple {
        Triple::new(subject(from), Term::iri(RELATED), subject(to))
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    #[test]
    fn phase_transitions() {
        use WritePhase::*;
        assert!(Resolving.can_advance_to(IntegrityChecking));
        assert!(IntegrityChecking.can_advance_to(Committing));
        assert!(IntegrityChecking.can_advance_to(Versioning));
        assert!(Committing.can_advance_to(Aborted));
        assert!(!Resolving.can_advance_to(Committing));
        assert!(!Done.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Resolving));
    }

    // -----------------------------------------------------------------------
    // Create / read
    // -----------------------------------------------------------------------

    #[test]
    fn bootstrap_is_idempotent() {
        let m = manager(IntegrityPolicy::Lenient);
        assert!(!m.bootstrap(DEFAULT_ACTOR).unwrap());
        let root = m.get("").unwrap();
        assert!(root.types().contains(fcrepo::ROOT));
    }

    #[test]
    fn create_writes_state_metadata_and_containment() {
        let (m, recorder) = manager_with(IntegrityPolicy::Lenient, false);
        let outcome = m.create("books", titled("books", "Books"), "alice").unwrap();
        assert_eq!(outcome.kind, ChangeKind::Create);

        let snapshot = m.get("books").unwrap();
        assert_eq!(snapshot.state, titled("books", "Books"));
        let s = subject("books");
        assert!(has_type(&snapshot.metadata, &s, ldp::BASIC_CONTAINER));
        assert_eq!(
            object(&snapshot.metadata, &s, fcrepo::CREATED_BY).and_then(Term::as_lexical),
            Some("alice")
        );
        assert_eq!(
            object(&snapshot.metadata, &s, fcrepo::HAS_PARENT),
            Some(&Term::iri("repo:res/"))
        );
        assert!(object(&snapshot.metadata, &s, premis::HAS_MESSAGE_DIGEST).is_some());
        assert_eq!(m.children("").unwrap(), vec![Uid::parse("books").unwrap()]);
        assert_eq!(
            recorder.kinds(),
            vec![("repo:res/books".to_string(), ChangeKind::Create)]
        );
    }

    #[test]
    fn create_twice_fails() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        assert!(matches!(
            m.create("a", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::AlreadyExists(_))
        ));
    }

    #[test]
    fn invalid_input_is_rejected_before_writing() {
        let m = manager(IntegrityPolicy::Lenient);
        assert!(matches!(
            m.create("a//b", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::InvalidUid { .. })
        ));
        assert!(matches!(
            m.create("a", titled("b", "elsewhere"), DEFAULT_ACTOR),
            Err(LayoutError::InvalidTriple(_))
        ));
        let managed = TripleSet::from([Triple::new(
            subject("a"),
            Term::iri(fcrepo::CREATED_BY),
            Term::literal("mallory"),
        )]);
        assert!(matches!(
            m.create("a", managed, DEFAULT_ACTOR),
            Err(LayoutError::InvalidTriple(_))
        ));
        assert_eq!(m.status("a").unwrap(), ResourceStatus::Absent);
    }

    #[test]
    fn fragment_subjects_are_accepted() {
        let m = manager(IntegrityPolicy::Lenient);
        let triples = TripleSet::from([Triple::new(
            Term::iri("repo:res/a#chapter1"),
            Term::iri(TITLE),
            Term::literal("Loomings"),
        )]);
        m.create("a", triples.clone(), DEFAULT_ACTOR).unwrap();
        assert_eq!(m.get("a").unwrap().state, triples);
    }

    #[test]
    fn nested_create_without_split_hangs_off_nearest_ancestor() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a/b/c", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        assert_eq!(m.children("a").unwrap(), vec![Uid::parse("a/b/c").unwrap()]);
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Absent);
    }

    #[test]
    fn legacy_split_creates_pairtree_nodes() {
        let (m, _) = manager_with(IntegrityPolicy::Lenient, true);
        m.create("a/b/c", TripleSet::new(), DEFAULT_ACTOR).unwrap();

        assert_eq!(m.status("a").unwrap(), ResourceStatus::Pairtree);
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Pairtree);
        assert_eq!(
            m.children("").unwrap(),
            vec![Uid::parse("a").unwrap(), Uid::parse("a/b/c").unwrap()]
        );
        assert_eq!(m.children("a").unwrap(), vec![Uid::parse("a/b").unwrap()]);
        assert_eq!(m.children("a/b").unwrap(), vec![Uid::parse("a/b/c").unwrap()]);
        assert!(matches!(m.get("a/b"), Err(LayoutError::NotFound(_))));

        let c = m.get("a/b/c").unwrap();
        assert_eq!(
            object(&c.metadata, &subject("a/b/c"), fcrepo::HAS_PARENT),
            Some(&Term::iri("repo:res/"))
        );
    }

    #[test]
    fn creating_at_a_pairtree_node_converts_it() {
        let (m, _) = manager_with(IntegrityPolicy::Lenient, true);
        m.create("a/b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a", titled("a", "A"), DEFAULT_ACTOR).unwrap();

        assert_eq!(m.status("a").unwrap(), ResourceStatus::Live);
        let a = m.get("a").unwrap();
        assert!(!has_type(&a.metadata, &subject("a"), fcrepo::PAIRTREE));
        assert_eq!(m.children("a").unwrap(), vec![Uid::parse("a/b").unwrap()]);
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    #[test]
    fn strict_write_with_dangling_reference_leaves_nothing() {
        let m = manager(IntegrityPolicy::Strict);
        let triples = TripleSet::from([link("a", "missing")]);
        assert!(matches!(
            m.create("a", triples, DEFAULT_ACTOR),
            Err(LayoutError::ReferentialIntegrityViolation { .. })
        ));
        assert!(!m.store().graph_exists("repo:state/a").unwrap());
        assert!(!m.store().graph_exists("repo:meta/a").unwrap());
    }

    #[test]
    fn lenient_write_drops_only_dangling_triples() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        let mut triples = titled("a", "A");
        triples.insert(link("a", "b"));
        triples.insert(link("a", "missing"));
        let outcome = m.create("a", triples, DEFAULT_ACTOR).unwrap();
        assert_eq!(outcome.dropped, vec![link("a", "missing")]);
        assert_eq!(m.get("a").unwrap().state.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Update / versions
    // -----------------------------------------------------------------------

    #[test]
    fn updates_create_ordered_versions() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", titled("a", "v0"), DEFAULT_ACTOR).unwrap();
        for n in 1..=3 {
            let outcome = m.update("a", titled("a", &format!("v{n}")), "bob").unwrap();
            assert_eq!(outcome.version.unwrap().sequence, n);
        }
        let versions = m.versions("a").unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(m.get_version("a", "v1").unwrap(), titled("a", "v0"));
        assert_eq!(m.get_version("a", &versions[2].id).unwrap(), titled("a", "v2"));
        assert_eq!(m.get("a").unwrap().state, titled("a", "v3"));
        assert!(matches!(
            m.get_version("a", "v9"),
            Err(LayoutError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn update_refreshes_digest_and_modifier() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", titled("a", "one"), "alice").unwrap();
        let before = m.get("a").unwrap().metadata;
        m.update("a", titled("a", "two"), "bob").unwrap();
        let after = m.get("a").unwrap().metadata;
        let s = subject("a");
        assert_ne!(
            object(&before, &s, premis::HAS_MESSAGE_DIGEST),
            object(&after, &s, premis::HAS_MESSAGE_DIGEST)
        );
        assert_eq!(objects(&after, &s, premis::HAS_MESSAGE_DIGEST).count(), 1);
        assert_eq!(
            object(&after, &s, fcrepo::LAST_MODIFIED_BY).and_then(Term::as_lexical),
            Some("bob")
        );
        assert_eq!(
            object(&after, &s, fcrepo::CREATED_BY).and_then(Term::as_lexical),
            Some("alice")
        );
    }

    #[test]
    fn update_of_missing_resource_fails() {
        let m = manager(IntegrityPolicy::Lenient);
        assert!(matches!(
            m.update("nope", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::NotFound(_))
        ));
    }

    #[test]
    fn put_creates_then_updates() {
        let m = manager(IntegrityPolicy::Lenient);
        assert_eq!(
            m.put("a", titled("a", "1"), DEFAULT_ACTOR).unwrap().kind,
            ChangeKind::Create
        );
        assert_eq!(
            m.put("a", titled("a", "2"), DEFAULT_ACTOR).unwrap().kind,
            ChangeKind::Update
        );
        assert_eq!(m.versions("a").unwrap().len(), 1);
    }

    #[test]
    fn revert_restores_an_old_state() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", titled("a", "first"), DEFAULT_ACTOR).unwrap();
        m.update("a", titled("a", "second"), DEFAULT_ACTOR).unwrap();
        m.revert_to_version("a", "v1", DEFAULT_ACTOR).unwrap();
        assert_eq!(m.get("a").unwrap().state, titled("a", "first"));
        assert_eq!(m.versions("a").unwrap().len(), 2);
        assert_eq!(m.get_version("a", "v2").unwrap(), titled("a", "second"));
    }

    // -----------------------------------------------------------------------
    // Delete / purge / resurrect
    // -----------------------------------------------------------------------

    #[test]
    fn delete_leaves_tombstone_with_versions() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", titled("a", "A"), DEFAULT_ACTOR).unwrap();
        m.delete("a", DEFAULT_ACTOR).unwrap();

        assert_eq!(m.status("a").unwrap(), ResourceStatus::Tombstone);
        assert!(matches!(m.get("a"), Err(LayoutError::Tombstoned(_))));
        assert!(matches!(
            m.create("a", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::Tombstoned(_))
        ));
        assert!(matches!(
            m.create("a/child", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::Tombstoned(_))
        ));
        assert_eq!(m.get_version("a", "v1").unwrap(), titled("a", "A"));
    }

    #[test]
    fn root_cannot_be_deleted() {
        let m = manager(IntegrityPolicy::Lenient);
        assert!(matches!(
            m.delete("", DEFAULT_ACTOR),
            Err(LayoutError::InvalidUid { .. })
        ));
    }

    #[test]
    fn strict_delete_of_referenced_resource_fails() {
        let m = manager(IntegrityPolicy::Strict);
        m.create("b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a", TripleSet::from([link("a", "b")]), DEFAULT_ACTOR).unwrap();
        assert!(matches!(
            m.delete("b", DEFAULT_ACTOR),
            Err(LayoutError::ReferentialIntegrityViolation { .. })
        ));
        assert_eq!(m.status("b").unwrap(), ResourceStatus::Live);
    }

    #[test]
    fn lenient_delete_removes_inbound_references() {
        let (m, recorder) = manager_with(IntegrityPolicy::Lenient, false);
        m.create("b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        let mut triples = titled("a", "A");
        triples.insert(link("a", "b"));
        m.create("a", triples, DEFAULT_ACTOR).unwrap();

        let outcome = m.delete("b", DEFAULT_ACTOR).unwrap();
        assert_eq!(m.get("a").unwrap().state, titled("a", "A"));
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.dropped, vec![link("a", "b")]);
        assert!(recorder
            .kinds()
            .contains(&("repo:res/a".to_string(), ChangeKind::Update)));
    }

    #[test]
    fn lenient_delete_refreshes_referrer_digest() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        let mut triples = titled("a", "A");
        triples.insert(link("a", "b"));
        m.create("a", triples, "alice").unwrap();
        let s = subject("a");
        let before = m.get("a").unwrap().metadata;

        let outcome = m.delete("b", "bob").unwrap();
        assert_eq!(outcome.dropped, vec![link("a", "b")]);

        let a = m.get("a").unwrap();
        assert_eq!(
            object(&a.metadata, &s, premis::HAS_MESSAGE_DIGEST),
            Some(&m.state_digest(&a.state))
        );
        assert_ne!(
            object(&before, &s, premis::HAS_MESSAGE_DIGEST),
            object(&a.metadata, &s, premis::HAS_MESSAGE_DIGEST)
        );
        assert_eq!(objects(&a.metadata, &s, fcrepo::LAST_MODIFIED).count(), 1);
        assert_eq!(
            object(&a.metadata, &s, fcrepo::LAST_MODIFIED_BY).and_then(Term::as_lexical),
            Some("bob")
        );
        assert!(m.versions("a").unwrap().is_empty());
    }

    #[test]
    fn delete_buries_contained_resources() {
        let (m, recorder) = manager_with(IntegrityPolicy::Lenient, false);
        m.create("a", titled("a", "A"), DEFAULT_ACTOR).unwrap();
        m.create("a/b", titled("a/b", "B"), DEFAULT_ACTOR).unwrap();
        m.create("a/b/c", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("x", TripleSet::from([link("x", "a/b/c")]), DEFAULT_ACTOR).unwrap();

        let outcome = m.delete("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(outcome.version.unwrap().sequence, 1);
        assert_eq!(outcome.dropped, vec![link("x", "a/b/c")]);
        for uid in ["a", "a/b", "a/b/c"] {
            assert_eq!(m.status(uid).unwrap(), ResourceStatus::Tombstone);
        }
        let buried = m.store().graph("repo:meta/a/b").unwrap().unwrap();
        assert_eq!(
            object(&buried, &subject("a/b"), fcsystem::TOMBSTONE_POINTER),
            Some(&subject("a"))
        );
        assert!(!has_type(&buried, &subject("a/b"), fcsystem::TOMBSTONE));
        assert_eq!(m.get_version("a/b", "v1").unwrap(), titled("a/b", "B"));
        assert!(m.get("x").unwrap().state.is_empty());

        let kinds = recorder.kinds();
        for uid in ["a", "a/b", "a/b/c"] {
            assert!(kinds.contains(&(format!("repo:res/{uid}"), ChangeKind::Delete)));
        }
        assert!(kinds.contains(&("repo:res/x".to_string(), ChangeKind::Update)));
    }

    #[test]
    fn buried_resource_waits_for_its_burier() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a/b", titled("a/b", "B"), DEFAULT_ACTOR).unwrap();
        m.delete("a", DEFAULT_ACTOR).unwrap();

        match m.resurrect("a/b", DEFAULT_ACTOR) {
            Err(LayoutError::Tombstoned(uid)) => assert_eq!(uid.as_str(), "a"),
            other => panic!("expected tombstoned parent, got {other:?}"),
        }
        m.resurrect("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Tombstone);

        m.resurrect("a/b", DEFAULT_ACTOR).unwrap();
        let b = m.get("a/b").unwrap();
        assert_eq!(b.state, titled("a/b", "B"));
        assert!(object(&b.metadata, &subject("a/b"), fcsystem::TOMBSTONE_POINTER).is_none());
    }

    #[test]
    fn strict_delete_ignores_references_inside_the_subtree() {
        let m = manager(IntegrityPolicy::Strict);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a/b", TripleSet::from([link("a/b", "a")]), DEFAULT_ACTOR).unwrap();
        m.create("x", TripleSet::from([link("x", "a/b")]), DEFAULT_ACTOR).unwrap();

        assert!(matches!(
            m.delete("a", DEFAULT_ACTOR),
            Err(LayoutError::ReferentialIntegrityViolation { .. })
        ));
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Live);

        m.delete("x", DEFAULT_ACTOR).unwrap();
        m.delete("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Tombstone);
    }

    #[test]
    fn purge_removes_contained_resources() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a/b", titled("a/b", "B"), DEFAULT_ACTOR).unwrap();
        m.update("a/b", titled("a/b", "B2"), DEFAULT_ACTOR).unwrap();
        m.put_binary("a/img", b"pixels", "image/png", DEFAULT_ACTOR).unwrap();
        let digest = m.get_binary("a/img").unwrap().digest;
        m.delete("a/b", DEFAULT_ACTOR).unwrap();

        let outcome = m.purge("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(outcome.events.len(), 3);
        for uid in ["a", "a/b", "a/img"] {
            assert_eq!(m.status(uid).unwrap(), ResourceStatus::Absent);
        }
        for prefix in ["repo:state/a", "repo:meta/a"] {
            assert!(m
                .store()
                .graph_names(&GraphScope::Prefix(prefix.into()))
                .unwrap()
                .is_empty());
        }
        assert!(!m.binaries().exists(&digest).unwrap());
        assert!(m.children("").unwrap().is_empty());
    }

    #[test]
    fn cascade_crosses_pairtree_nodes() {
        let (m, _) = manager_with(IntegrityPolicy::Lenient, true);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a/b/c", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Pairtree);

        m.delete("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(m.status("a/b/c").unwrap(), ResourceStatus::Tombstone);
        assert_eq!(m.status("a/b").unwrap(), ResourceStatus::Pairtree);

        m.purge("a", DEFAULT_ACTOR).unwrap();
        for uid in ["a", "a/b", "a/b/c"] {
            assert_eq!(m.status(uid).unwrap(), ResourceStatus::Absent);
        }
    }

    #[test]
    fn off_delete_leaves_inbound_references() {
        let m = manager(IntegrityPolicy::Off);
        m.create("b", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("a", TripleSet::from([link("a", "b")]), DEFAULT_ACTOR).unwrap();
        m.delete("b", DEFAULT_ACTOR).unwrap();
        assert!(m.get("a").unwrap().state.contains(&link("a", "b")));
    }

    #[test]
    fn purge_removes_everything() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", titled("a", "A"), DEFAULT_ACTOR).unwrap();
        m.update("a", titled("a", "B"), DEFAULT_ACTOR).unwrap();
        m.delete("a", DEFAULT_ACTOR).unwrap();
        m.purge("a", DEFAULT_ACTOR).unwrap();

        assert_eq!(m.status("a").unwrap(), ResourceStatus::Absent);
        let leftovers = m
            .store()
            .graph_names(&GraphScope::Prefix("repo:state/a".into()))
            .unwrap();
        assert!(leftovers.is_empty());
        assert!(m.children("").unwrap().is_empty());
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
    }

    #[test]
    fn resurrect_restores_latest_version() {
        let (m, recorder) = manager_with(IntegrityPolicy::Lenient, false);
        m.create("a", titled("a", "A"), DEFAULT_ACTOR).unwrap();
        m.delete("a", DEFAULT_ACTOR).unwrap();
        let outcome = m.resurrect("a", DEFAULT_ACTOR).unwrap();
        assert_eq!(outcome.kind, ChangeKind::Create);
        assert_eq!(m.get("a").unwrap().state, titled("a", "A"));
        assert!(!m.get("a").unwrap().types().contains(fcsystem::TOMBSTONE));
        assert_eq!(recorder.kinds().last().unwrap().1, ChangeKind::Create);
        assert!(matches!(
            m.resurrect("a", DEFAULT_ACTOR),
            Err(LayoutError::AlreadyExists(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    const HAS_MEMBER: &str = "http://pcdm.org/models#hasMember";
    const PROXY_FOR: &str = "http://www.openarchives.org/ore/terms/proxyFor";

    fn container(uid: &str, kind: &str, inserted: Option<&str>) -> TripleSet {
        let s = subject(uid);
        let mut state = TripleSet::from([
            triple(&s, rdf::TYPE, vocab::iri(kind)),
            triple(&s, ldp::MEMBERSHIP_RESOURCE, subject("book")),
            triple(&s, ldp::HAS_MEMBER_RELATION, Term::iri(HAS_MEMBER)),
        ]);
        if let Some(relation) = inserted {
            state.insert(triple(&s, ldp::INSERTED_CONTENT_RELATION, Term::iri(relation)));
        }
        state
    }

    fn member(target: &str) -> Triple {
        Triple::new(subject("book"), Term::iri(HAS_MEMBER), subject(target))
    }

    #[test]
    fn direct_container_lists_live_children() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("book", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        let members = container("book/pages", ldp::DIRECT_CONTAINER, None);
        m.create("book/pages", members, DEFAULT_ACTOR).unwrap();
        m.create("book/pages/p1", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("book/pages/p2", TripleSet::new(), DEFAULT_ACTOR).unwrap();

        assert_eq!(
            m.membership("book/pages").unwrap(),
            TripleSet::from([member("book/pages/p1"), member("book/pages/p2")])
        );
        m.delete("book/pages/p2", DEFAULT_ACTOR).unwrap();
        assert_eq!(
            m.membership("book/pages").unwrap(),
            TripleSet::from([member("book/pages/p1")])
        );
        assert!(m.membership("book").unwrap().is_empty());
    }

    #[test]
    fn indirect_container_lists_inserted_content() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("book", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        m.create("scan", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        let proxies = container("book/proxies", ldp::INDIRECT_CONTAINER, Some(PROXY_FOR));
        m.create("book/proxies", proxies, DEFAULT_ACTOR).unwrap();
        let proxy = TripleSet::from([Triple::new(
            subject("book/proxies/p1"),
            Term::iri(PROXY_FOR),
            subject("scan"),
        )]);
        m.create("book/proxies/p1", proxy, DEFAULT_ACTOR).unwrap();
        m.create("book/proxies/p2", TripleSet::new(), DEFAULT_ACTOR).unwrap();

        assert_eq!(
            m.membership("book/proxies").unwrap(),
            TripleSet::from([member("scan")])
        );
    }

    // -----------------------------------------------------------------------
    // Binaries
    // -----------------------------------------------------------------------

    #[test]
    fn binary_roundtrip_and_replace() {
        let m = manager(IntegrityPolicy::Lenient);
        m.put_binary("img", b"first", "image/png", DEFAULT_ACTOR).unwrap();
        let content = m.get_binary("img").unwrap();
        assert_eq!(content.data, b"first");
        assert_eq!(content.mime.as_deref(), Some("image/png"));

        let outcome = m.put_binary("img", b"second", "image/png", DEFAULT_ACTOR).unwrap();
        assert_eq!(outcome.kind, ChangeKind::Update);
        assert_eq!(m.get_binary("img").unwrap().data, b"second");

        let meta = m.get("img").unwrap().metadata;
        assert_eq!(
            object(&meta, &subject("img"), premis::HAS_SIZE).and_then(Term::as_lexical),
            Some("6")
        );
        assert!(matches!(
            m.update("img", TripleSet::new(), DEFAULT_ACTOR),
            Err(LayoutError::Conflict(_))
        ));
    }

    #[test]
    fn purge_deletes_unshared_payload_only() {
        let m = manager(IntegrityPolicy::Lenient);
        m.put_binary("x", b"shared", "text/plain", DEFAULT_ACTOR).unwrap();
        m.put_binary("y", b"shared", "text/plain", DEFAULT_ACTOR).unwrap();
        let digest = m.get_binary("x").unwrap().digest;

        m.purge("x", DEFAULT_ACTOR).unwrap();
        assert!(m.binaries().exists(&digest).unwrap());
        m.purge("y", DEFAULT_ACTOR).unwrap();
        assert!(!m.binaries().exists(&digest).unwrap());
    }

    #[test]
    fn rdf_source_is_not_a_binary() {
        let m = manager(IntegrityPolicy::Lenient);
        m.create("a", TripleSet::new(), DEFAULT_ACTOR).unwrap();
        assert!(matches!(m.get_binary("a"), Err(LayoutError::Conflict(_))));
        assert!(matches!(
            m.put_binary("a", b"x", "text/plain", DEFAULT_ACTOR),
            Err(LayoutError::Conflict(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_updates_each_produce_a_version() {
        let m = Arc::new(manager(IntegrityPolicy::Lenient));
        m.create("a", titled("a", "start"), DEFAULT_ACTOR).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    m.update("a", titled("a", &format!("t{n}")), DEFAULT_ACTOR)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let sequences: Vec<u64> = m.versions("a").unwrap().iter().map(|v| v.sequence).collect();
        assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());
    }
}
