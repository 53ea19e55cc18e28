//! Namespaces and vocabulary terms.
//!
//! The three repository namespaces are wire-visible: changing any of them
//! invalidates every stored graph name.

use crate::term::Term;

/// Resource subjects: `repo:res/<uid>`. The bare prefix is the root.
pub const RES_NS: &str = "repo:res/";
/// Metadata graphs: `repo:meta/<uid>`.
pub const META_NS: &str = "repo:meta/";
/// State and version graphs: `repo:state/<uid>[:<version-id>]`.
pub const STATE_NS: &str = "repo:state/";

/// Separator between a state graph name and a version id.
pub const VERSION_SEPARATOR: char = ':';

pub mod rdf {
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

pub mod xsd {
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

pub mod ldp {
    pub const CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";
    pub const RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
    pub const RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#RDFSource";
    pub const NON_RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#NonRDFSource";
    pub const CONTAINER: &str = "http://www.w3.org/ns/ldp#Container";
    pub const BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
    pub const DIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#DirectContainer";
    pub const INDIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#IndirectContainer";
    pub const MEMBERSHIP_RESOURCE: &str = "http://www.w3.org/ns/ldp#membershipResource";
    pub const HAS_MEMBER_RELATION: &str = "http://www.w3.org/ns/ldp#hasMemberRelation";
    pub const INSERTED_CONTENT_RELATION: &str =
        "http://www.w3.org/ns/ldp#insertedContentRelation";
}

pub mod fcrepo {
    pub const CREATED: &str = "http://fedora.info/definitions/v4/repository#created";
    pub const CREATED_BY: &str = "http://fedora.info/definitions/v4/repository#createdBy";
    pub const LAST_MODIFIED: &str = "http://fedora.info/definitions/v4/repository#lastModified";
    pub const LAST_MODIFIED_BY: &str =
        "http://fedora.info/definitions/v4/repository#lastModifiedBy";
    pub const HAS_PARENT: &str = "http://fedora.info/definitions/v4/repository#hasParent";
    pub const HAS_VERSION: &str = "http://fedora.info/definitions/v4/repository#hasVersion";
    pub const HAS_VERSION_LABEL: &str =
        "http://fedora.info/definitions/v4/repository#hasVersionLabel";
    /// System-only containment, used by pairtree nodes.
    pub const CONTAINS: &str = "http://fedora.info/definitions/v4/repository#contains";

    pub const RESOURCE: &str = "http://fedora.info/definitions/v4/repository#Resource";
    pub const CONTAINER: &str = "http://fedora.info/definitions/v4/repository#Container";
    pub const BINARY: &str = "http://fedora.info/definitions/v4/repository#Binary";
    pub const PAIRTREE: &str = "http://fedora.info/definitions/v4/repository#Pairtree";
    pub const VERSION: &str = "http://fedora.info/definitions/v4/repository#Version";
    pub const ROOT: &str = "http://fedora.info/definitions/v4/repository#RepositoryRoot";
}

pub mod fcsystem {
    pub const STATE_OF: &str = "info:fcsystem/stateOf";
    pub const VERSION_SEQUENCE: &str = "info:fcsystem/versionSequence";
    pub const TOMBSTONE: &str = "info:fcsystem/Tombstone";
    /// Points a buried descendant at the deleted resource that buried it.
    pub const TOMBSTONE_POINTER: &str = "info:fcsystem/tombstone";
    pub const REFERENTIAL_INTEGRITY: &str = "info:fcsystem/referentialIntegrity";
}

pub mod premis {
    pub const HAS_MESSAGE_DIGEST: &str = "http://www.loc.gov/premis/rdf/v1#hasMessageDigest";
    pub const HAS_SIZE: &str = "http://www.loc.gov/premis/rdf/v1#hasSize";
}

pub mod ebucore {
    pub const HAS_MIME_TYPE: &str =
        "http://www.ebu.ch/metadata/ontologies/ebucore/ebucore#hasMimeType";
}

/// Predicates only the server may write.
pub const SERVER_MANAGED_PREDICATES: &[&str] = &[
    fcrepo::CREATED,
    fcrepo::CREATED_BY,
    fcrepo::LAST_MODIFIED,
    fcrepo::LAST_MODIFIED_BY,
    fcrepo::HAS_PARENT,
    fcrepo::HAS_VERSION,
    fcrepo::HAS_VERSION_LABEL,
    fcrepo::CONTAINS,
    ldp::CONTAINS,
    fcsystem::STATE_OF,
    fcsystem::VERSION_SEQUENCE,
    fcsystem::TOMBSTONE_POINTER,
    fcsystem::REFERENTIAL_INTEGRITY,
    premis::HAS_MESSAGE_DIGEST,
    premis::HAS_SIZE,
];

/// `rdf:type` objects only the server may assert.
pub const SERVER_MANAGED_TYPES: &[&str] = &[
    fcrepo::RESOURCE,
    fcrepo::CONTAINER,
    fcrepo::BINARY,
    fcrepo::PAIRTREE,
    fcrepo::VERSION,
    fcrepo::ROOT,
    fcsystem::TOMBSTONE,
];

/// Shorthand for an IRI term.
pub fn iri(value: &str) -> Term {
    Term::iri(value)
}

/// Returns `true` if `predicate` (and `object`, for `rdf:type`) is reserved
/// for the server.
pub fn is_server_managed(predicate: &Term, object: &Term) -> bool {
    let Some(p) = predicate.as_iri() else {
        return false;
    };
    if SERVER_MANAGED_PREDICATES.contains(&p) {
        return true;
    }
    p == rdf::TYPE
        && object
            .as_iri()
            .is_some_and(|o| SERVER_MANAGED_TYPES.contains(&o))
}
