//! Persisted referential integrity policy and store-wide migration.
//!
//! The policy a store was bootstrapped with is recorded in the root
//! metadata graph as `<repo:res/> fcsystem:referentialIntegrity "<policy>"`.
//! Opening a store with a different configured policy is refused until the
//! store has been re-validated with [`LayoutManager::migrate_policy`].

use std::sync::PoisonError;

use chrono::Utc;
use tracing::{info, warn};

use lake_graph::{GraphScope, Precondition, Transaction};
use lake_messaging::{ChangeEvent, ChangeKind};
use lake_types::vocab::{fcsystem, RES_NS};
use lake_types::{ResourceUris, Term, Triple, TripleSet, Uid};

use crate::config::IntegrityPolicy;
use crate::describe::{object, triple};
use crate::error::{LayoutError, LayoutResult};
use crate::integrity::IntegrityChecker;
use crate::manager::LayoutManager;
use crate::resolver::uid_of_state_graph;

/// Result of a policy migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationReport {
    /// Policy recorded before the migration, if any.
    pub from: Option<IntegrityPolicy>,
    pub to: IntegrityPolicy,
    /// Number of current-state graphs inspected.
    pub scanned: usize,
    /// References removed by a migration to `lenient`.
    pub pruned: Vec<(Uid, Triple)>,
}

impl LayoutManager {
    pub(crate) fn policy_triple(&self, policy: IntegrityPolicy) -> Triple {
        triple(
            &Term::iri(RES_NS),
            fcsystem::REFERENTIAL_INTEGRITY,
            Term::literal(policy.as_str()),
        )
    }

    /// Policy recorded in the root metadata. `None` before bootstrap.
    pub fn persisted_policy(&self) -> LayoutResult<Option<IntegrityPolicy>> {
        let root = ResourceUris::resolve(&Uid::root());
        let Some(metadata) = self.store.graph(&root.metadata_graph)? else {
            return Ok(None);
        };
        object(
            &metadata,
            &Term::iri(&root.subject),
            fcsystem::REFERENTIAL_INTEGRITY,
        )
        .and_then(Term::as_lexical)
        .map(str::parse)
        .transpose()
    }

    /// Refuse to run with a policy other than the recorded one.
    pub fn verify_policy(&self) -> LayoutResult<()> {
        let active = self.policy();
        match self.persisted_policy()? {
            Some(recorded) if recorded != active => Err(LayoutError::MigrationRequired(format!(
                "store uses referential integrity {recorded}, configuration asks for \
                 {active}; migrate the policy first"
            ))),
            _ => Ok(()),
        }
    }

    /// Re-validate every current state against `target` and make it the
    /// active and recorded policy.
    ///
    /// - `off` accepts the store as it is.
    /// - `lenient` removes every dangling reference. Each affected resource
    ///   gets an update event; no versions are created.
    /// - `strict` fails with [`LayoutError::ReferentialIntegrityViolation`]
    ///   if any dangling reference remains, leaving the policy unchanged.
    ///
    /// Writes wait until the migration has scanned the store and switched
    /// the policy.
    pub fn migrate_policy(
        &self,
        target: IntegrityPolicy,
        actor: &str,
    ) -> LayoutResult<MigrationReport> {
        let _exclusive = self.writes.write().unwrap_or_else(PoisonError::into_inner);
        let from = self.persisted_policy()?;
        let states = self.store.graph_names(&GraphScope::CurrentState)?;
        let mut report = MigrationReport {
            from,
            to: target,
            scanned: states.len(),
            pruned: Vec::new(),
        };
        let checker = IntegrityChecker::new(self.store.as_ref(), target);

        match target {
            IntegrityPolicy::Off => {}
            IntegrityPolicy::Strict => {
                let mut dangling = Vec::new();
                for graph in &states {
                    let Some(uid) = uid_of_state_graph(graph) else {
                        continue;
                    };
                    let triples = self.store.graph(graph)?.unwrap_or_default();
                    for t in checker.dangling(&uid, &triples)? {
                        dangling.push(format!("{graph}: {t}"));
                    }
                }
                if !dangling.is_empty() {
                    warn!(count = dangling.len(), "store has dangling references");
                    return Err(LayoutError::ReferentialIntegrityViolation {
                        subject: "store".into(),
                        dangling,
                    });
                }
            }
            IntegrityPolicy::Lenient => {
                for graph in &states {
                    let Some(uid) = uid_of_state_graph(graph) else {
                        continue;
                    };
                    report.pruned.extend(self.prune(&checker, &uid, actor)?);
                }
            }
        }

        self.record_policy(target)?;
        match self.policy.write() {
            Ok(mut policy) => *policy = target,
            Err(poisoned) => *poisoned.into_inner() = target,
        }
        info!(
            from = ?report.from,
            to = %target,
            scanned = report.scanned,
            pruned = report.pruned.len(),
            "migrated referential integrity policy"
        );
        Ok(report)
    }

    /// Remove dangling references from one resource under its lock.
    fn prune(
        &self,
        checker: &IntegrityChecker<'_>,
        uid: &Uid,
        actor: &str,
    ) -> LayoutResult<Vec<(Uid, Triple)>> {
        let resolved = self.resolver.resolve_uid(uid);
        let event = {
            let _guard = self.locks.lock(uid)?;
            let Some(state) = self.store.graph(&resolved.uris.state_graph)? else {
                return Ok(Vec::new());
            };
            let dangling: TripleSet = checker.dangling(uid, &state)?.into_iter().collect();
            if dangling.is_empty() {
                return Ok(Vec::new());
            }
            let remaining: TripleSet = state.difference(&dangling).cloned().collect();
            let now = Utc::now();
            let mut tx = Transaction::new();
            tx.require(Precondition::GraphExists(resolved.uris.state_graph.clone()))
                .remove(resolved.uris.state_graph.clone(), dangling.clone());
            self.set_digest(&mut tx, &resolved, self.state_digest(&remaining));
            self.touch(&mut tx, &resolved, actor, now);
            self.store.commit(tx)?;
            info!(uid = %uid, removed = dangling.len(), "pruned dangling references");

            ChangeEvent::new(&resolved.uris.subject, actor, ChangeKind::Update, now)
                .with_types(self.current_types(&resolved.uris))
                .with_delta(TripleSet::new(), dangling)
        };
        self.notify(std::slice::from_ref(&event));
        Ok(event
            .removed
            .into_iter()
            .map(|t| (uid.clone(), t))
            .collect())
    }

    /// Rewrite the recorded policy. Stores without a root are left alone;
    /// bootstrap records the policy.
    fn record_policy(&self, policy: IntegrityPolicy) -> LayoutResult<()> {
        let root = self.resolver.resolve_uid(&Uid::root());
        let _guard = self.locks.lock(&root.uid)?;
        if !self.store.graph_exists(&root.uris.state_graph)? {
            return Ok(());
        }
        let mut tx = Transaction::new();
        tx.require(Precondition::GraphExists(root.uris.state_graph.clone()))
            .remove_pattern(
                root.uris.metadata_graph.clone(),
                Some(root.subject()),
                Some(Term::iri(fcsystem::REFERENTIAL_INTEGRITY)),
                None,
            )
            .insert_one(root.uris.metadata_graph.clone(), self.policy_triple(policy));
        self.store.commit(tx)?;
        Ok(())
    }
}
