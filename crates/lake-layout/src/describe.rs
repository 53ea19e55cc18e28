//! Helpers for reading and writing server-managed metadata triples.

use chrono::{DateTime, SecondsFormat, Utc};

use lake_types::vocab::{self, fcrepo, ldp, rdf, xsd};
use lake_types::{Term, Triple, TripleSet};

/// Types every RDF-source resource carries.
pub const RDF_SOURCE_TYPES: &[&str] = &[
    fcrepo::RESOURCE,
    fcrepo::CONTAINER,
    ldp::RESOURCE,
    ldp::RDF_SOURCE,
    ldp::CONTAINER,
    ldp::BASIC_CONTAINER,
];

/// Types every binary resource carries.
pub const BINARY_TYPES: &[&str] = &[
    fcrepo::RESOURCE,
    fcrepo::BINARY,
    ldp::RESOURCE,
    ldp::NON_RDF_SOURCE,
];

/// `xsd:dateTime` literal with microsecond precision.
pub fn datetime(ts: DateTime<Utc>) -> Term {
    Term::typed(ts.to_rfc3339_opts(SecondsFormat::Micros, true), xsd::DATE_TIME)
}

/// Parse an `xsd:dateTime` literal written by [`datetime`].
pub fn parse_datetime(term: &Term) -> Option<DateTime<Utc>> {
    let lexical = term.as_lexical()?;
    DateTime::parse_from_rfc3339(lexical)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn triple(subject: &Term, predicate: &str, object: Term) -> Triple {
    Triple::new(subject.clone(), vocab::iri(predicate), object)
}

/// `rdf:type` triples for each IRI.
pub fn type_triples(subject: &Term, types: &[&str]) -> TripleSet {
    types
        .iter()
        .map(|t| triple(subject, rdf::TYPE, vocab::iri(t)))
        .collect()
}

/// Objects of `<subject> <predicate> ?o`.
pub fn objects<'a>(
    graph: &'a TripleSet,
    subject: &'a Term,
    predicate: &'a str,
) -> impl Iterator<Item = &'a Term> + 'a {
    graph
        .iter()
        .filter(move |t| t.subject == *subject && t.predicate.as_iri() == Some(predicate))
        .map(|t| &t.object)
}

/// First object of `<subject> <predicate> ?o`.
pub fn object<'a>(
    graph: &'a TripleSet,
    subject: &'a Term,
    predicate: &'a str,
) -> Option<&'a Term> {
    objects(graph, subject, predicate).next()
}

/// `rdf:type` IRIs of `subject`.
pub fn types<'a>(graph: &'a TripleSet, subject: &'a Term) -> impl Iterator<Item = &'a str> + 'a {
    objects(graph, subject, rdf::TYPE).filter_map(Term::as_iri)
}

pub fn has_type(graph: &TripleSet, subject: &Term, type_iri: &str) -> bool {
    types(graph, subject).any(|t| t == type_iri)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn datetime_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let term = datetime(ts);
        assert_eq!(term.as_lexical(), Some("2024-01-02T03:04:05.000000Z"));
        assert_eq!(parse_datetime(&term), Some(ts));
    }

    #[test]
    fn type_lookup() {
        let s = Term::iri("repo:res/a");
        let graph = type_triples(&s, RDF_SOURCE_TYPES);
        assert!(has_type(&graph, &s, ldp::RDF_SOURCE));
        assert!(!has_type(&graph, &s, fcrepo::BINARY));
        assert_eq!(types(&graph, &s).count(), RDF_SOURCE_TYPES.len());
    }
}
