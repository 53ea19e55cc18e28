//! Foundation types for Lake.
//!
//! This crate provides the RDF data model and the identifier scheme shared by
//! every other Lake crate.
//!
//! # Key Types
//!
//! - [`Term`] / [`Triple`] / [`TripleSet`]: RDF terms and statements
//! - [`Uid`]: validated, client-chosen resource identifier
//! - [`ResourceUris`]: the URI triad a resource lives under
//! - [`vocab`]: namespaces and the server-managed vocabulary
//! - [`ntriples`]: canonical N-Triples serialization and parsing

pub mod error;
pub mod ntriples;
pub mod term;
pub mod uid;
pub mod vocab;

pub use error::TypeError;
pub use term::{Literal, Term, Triple, TripleSet};
pub use uid::{uid_of, ResourceUris, Uid};
