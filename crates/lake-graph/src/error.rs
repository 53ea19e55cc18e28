use crate::transaction::Precondition;

/// Errors from graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The backing store cannot be reached or its lock is poisoned.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// A transaction precondition did not hold; nothing was written.
    #[error("precondition failed: {0}")]
    PreconditionFailed(Precondition),

    /// I/O error from snapshot persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for graph store operations.
pub type GraphResult<T> = Result<T, GraphError>;
