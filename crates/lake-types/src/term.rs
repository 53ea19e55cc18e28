use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ntriples::escape_literal;
use crate::vocab;

/// An RDF literal: lexical form plus optional datatype or language tag.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

/// A single RDF term.
///
/// Ordering is total and stable (IRIs, then blank nodes, then literals), so
/// sets of terms and triples serialize deterministically.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri(value.into())
    }

    pub fn blank(id: impl Into<String>) -> Self {
        Self::Blank(id.into())
    }

    /// A plain (`xsd:string`) literal.
    pub fn literal(lexical: impl Into<String>) -> Self {
        Self::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        })
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        })
    }

    pub fn lang(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.into()),
        })
    }

    /// An `xsd:integer` literal.
    pub fn integer(value: u64) -> Self {
        Self::typed(value.to_string(), vocab::xsd::INTEGER)
    }

    /// The IRI string, if this term is an IRI.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The lexical form, if this term is a literal.
    pub fn as_lexical(&self) -> Option<&str> {
        match self {
            Self::Literal(lit) => Some(&lit.lexical),
            _ => None,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Self::Iri(_))
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Blank(id) => write!(f, "_:{id}"),
            Self::Literal(lit) => {
                write!(f, "\"{}\"", escape_literal(&lit.lexical))?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// An RDF statement.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Returns `true` if every given position matches (`None` is a wildcard).
    pub fn matches(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> bool {
        subject.map_or(true, |s| *s == self.subject)
            && predicate.map_or(true, |p| *p == self.predicate)
            && object.map_or(true, |o| *o == self.object)
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A set of triples with deterministic iteration order.
pub type TripleSet = BTreeSet<Triple>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_ntriples() {
        let t = Triple::new(
            Term::iri("repo:res/a"),
            Term::iri("http://purl.org/dc/elements/1.1/title"),
            Term::literal("Moby \"Dick\""),
        );
        assert_eq!(
            t.to_string(),
            r#"<repo:res/a> <http://purl.org/dc/elements/1.1/title> "Moby \"Dick\"" ."#
        );
    }

    #[test]
    fn literal_display_variants() {
        assert_eq!(Term::lang("chat", "fr").to_string(), "\"chat\"@fr");
        assert_eq!(
            Term::integer(7).to_string(),
            "\"7\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(Term::blank("b0").to_string(), "_:b0");
    }

    #[test]
    fn matches_with_wildcards() {
        let s = Term::iri("repo:res/a");
        let p = Term::iri("urn:p");
        let o = Term::literal("x");
        let t = Triple::new(s.clone(), p.clone(), o.clone());
        assert!(t.matches(None, None, None));
        assert!(t.matches(Some(&s), None, Some(&o)));
        assert!(!t.matches(None, Some(&Term::iri("urn:q")), None));
    }

    #[test]
    fn ordering_is_total_and_stable() {
        let mut set = TripleSet::new();
        set.insert(Triple::new(Term::iri("b"), Term::iri("p"), Term::literal("2")));
        set.insert(Triple::new(Term::iri("a"), Term::iri("p"), Term::literal("1")));
        let subjects: Vec<_> = set.iter().map(|t| t.subject.clone()).collect();
        assert_eq!(subjects, vec![Term::iri("a"), Term::iri("b")]);
    }

    #[test]
    fn serde_roundtrip() {
        let t = Triple::new(Term::iri("s"), Term::iri("p"), Term::typed("1", "urn:dt"));
        let json = serde_json::to_string(&t).unwrap();
        let parsed: Triple = serde_json::from_str(&json).unwrap();
        assert_eq!(t, parsed);
    }
}
