//! Membership triples of direct and indirect containers.
//!
//! A container whose state names an `ldp:membershipResource` and an
//! `ldp:hasMemberRelation` asserts one triple per live child:
//!
//! - `ldp:DirectContainer`: `<resource> <relation> <child>`
//! - `ldp:IndirectContainer`: `<resource> <relation> <o>` for every
//!   `<child> <insertedContentRelation> <o>` in the child's state
//!
//! Membership is derived when read, so deleting a child retracts it.

use lake_types::vocab::ldp;
use lake_types::{Term, Triple, TripleSet};

use crate::describe::{has_type, object, objects};

/// How a container derives membership triples from its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipRule {
    pub resource: Term,
    pub relation: Term,
    /// `ldp:insertedContentRelation`; `None` for a direct container.
    pub inserted_content: Option<String>,
}

impl MembershipRule {
    /// The rule a container's state declares, if any.
    pub fn of(subject: &Term, state: &TripleSet) -> Option<Self> {
        let resource = object(state, subject, ldp::MEMBERSHIP_RESOURCE)?.clone();
        let relation = object(state, subject, ldp::HAS_MEMBER_RELATION)?.clone();
        relation.as_iri()?;
        if has_type(state, subject, ldp::DIRECT_CONTAINER) {
            Some(Self {
                resource,
                relation,
                inserted_content: None,
            })
        } else if has_type(state, subject, ldp::INDIRECT_CONTAINER) {
            let inserted = object(state, subject, ldp::INSERTED_CONTENT_RELATION)?
                .as_iri()?
                .to_string();
            Some(Self {
                resource,
                relation,
                inserted_content: Some(inserted),
            })
        } else {
            None
        }
    }

    /// Triples contributed by one live child.
    pub fn members(&self, child: &Term, child_state: &TripleSet) -> TripleSet {
        let member = |target: &Term| {
            Triple::new(self.resource.clone(), self.relation.clone(), target.clone())
        };
        match &self.inserted_content {
            None => TripleSet::from([member(child)]),
            Some(predicate) => objects(child_state, child, predicate).map(member).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lake_types::vocab::{self, rdf};

    use crate::describe::triple;

    const MEMBER_OF: &str = "http://pcdm.org/models#hasMember";
    const PROXY_FOR: &str = "http://www.openarchives.org/ore/terms/proxyFor";

    fn container(kind: &str) -> (Term, TripleSet) {
        let subject = Term::iri("repo:res/members");
        let mut state = TripleSet::from([
            triple(&subject, rdf::TYPE, vocab::iri(kind)),
            triple(&subject, ldp::MEMBERSHIP_RESOURCE, Term::iri("repo:res/book")),
            triple(&subject, ldp::HAS_MEMBER_RELATION, Term::iri(MEMBER_OF)),
        ]);
        if kind == ldp::INDIRECT_CONTAINER {
            state.insert(triple(&subject, ldp::INSERTED_CONTENT_RELATION, Term::iri(PROXY_FOR)));
        }
        (subject, state)
    }

    #[test]
    fn direct_container_names_the_child() {
        let (subject, state) = container(ldp::DIRECT_CONTAINER);
        let rule = MembershipRule::of(&subject, &state).unwrap();
        let child = Term::iri("repo:res/members/p1");
        assert_eq!(
            rule.members(&child, &TripleSet::new()),
            TripleSet::from([Triple::new(
                Term::iri("repo:res/book"),
                Term::iri(MEMBER_OF),
                child
            )])
        );
    }

    #[test]
    fn indirect_container_names_inserted_content() {
        let (subject, state) = container(ldp::INDIRECT_CONTAINER);
        let rule = MembershipRule::of(&subject, &state).unwrap();
        let child = Term::iri("repo:res/members/p1");
        let child_state = TripleSet::from([triple(&child, PROXY_FOR, Term::iri("repo:res/page"))]);
        assert_eq!(
            rule.members(&child, &child_state),
            TripleSet::from([Triple::new(
                Term::iri("repo:res/book"),
                Term::iri(MEMBER_OF),
                Term::iri("repo:res/page")
            )])
        );
        assert!(rule.members(&child, &TripleSet::new()).is_empty());
    }

    #[test]
    fn incomplete_declarations_yield_no_rule() {
        let (subject, mut state) = container(ldp::DIRECT_CONTAINER);
        state.retain(|t| t.predicate.as_iri() != Some(ldp::HAS_MEMBER_RELATION));
        assert_eq!(MembershipRule::of(&subject, &state), None);

        let (subject, mut state) = container(ldp::INDIRECT_CONTAINER);
        state.retain(|t| t.predicate.as_iri() != Some(ldp::INSERTED_CONTENT_RELATION));
        assert_eq!(MembershipRule::of(&subject, &state), None);

        let basic = TripleSet::from([
            triple(&subject, ldp::MEMBERSHIP_RESOURCE, Term::iri("repo:res/book")),
            triple(&subject, ldp::HAS_MEMBER_RELATION, Term::iri(MEMBER_OF)),
        ]);
        assert_eq!(MembershipRule::of(&subject, &basic), None);
    }
}
