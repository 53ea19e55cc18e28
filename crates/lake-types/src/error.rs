use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid uid {uid:?}: {reason}")]
    InvalidUid { uid: String, reason: String },

    #[error("N-Triples syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("invalid term: {0}")]
    InvalidTerm(String),
}
