use lake_binary::BinaryError;
use lake_crypto::CryptoError;
use lake_graph::GraphError;
use lake_types::{TypeError, Uid};

/// Errors from layout operations.
///
/// Every error is raised before any durable mutation.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid uid {uid:?}: {reason}")]
    InvalidUid { uid: String, reason: String },

    #[error("resource already exists: {0}")]
    AlreadyExists(Uid),

    #[error("resource not found: {0}")]
    NotFound(Uid),

    /// The resource was deleted and only its tombstone remains.
    #[error("resource is a tombstone: {0}")]
    Tombstoned(Uid),

    /// A client triple is outside the resource or uses a server-managed term.
    #[error("invalid triple: {0}")]
    InvalidTriple(String),

    /// Strict policy found references to resources that do not exist.
    #[error(
        "referential integrity violation in {subject}: {} dangling reference(s)",
        .dangling.len()
    )]
    ReferentialIntegrityViolation {
        subject: String,
        dangling: Vec<String>,
    },

    #[error("version {version} not found for {uid}")]
    VersionNotFound { uid: Uid, version: String },

    /// A commit precondition was invalidated by a concurrent writer.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The persisted store format differs from the running configuration.
    #[error("migration required: {0}")]
    MigrationRequired(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Binary(BinaryError),
}

impl From<TypeError> for LayoutError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidUid { uid, reason } => Self::InvalidUid { uid, reason },
            other => Self::InvalidTriple(other.to_string()),
        }
    }
}

impl From<GraphError> for LayoutError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::PreconditionFailed(p) => Self::Conflict(p.to_string()),
            GraphError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<BinaryError> for LayoutError {
    fn from(err: BinaryError) -> Self {
        match err {
            BinaryError::MigrationRequired(msg) => Self::MigrationRequired(msg),
            BinaryError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::Binary(other),
        }
    }
}

/// Result alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;
