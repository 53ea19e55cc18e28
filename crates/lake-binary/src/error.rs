use lake_crypto::CryptoError;

/// Errors from binary store operations.
#[derive(Debug, thiserror::Error)]
pub enum BinaryError {
    /// No payload is stored under the digest.
    #[error("binary not found: {0}")]
    NotFound(String),

    /// Stored bytes no longer hash to their address.
    #[error("fixity mismatch for {expected}: computed {computed}")]
    FixityMismatch { expected: String, computed: String },

    /// The on-disk layout differs from the running configuration.
    #[error("binary store requires migration: {0}")]
    MigrationRequired(String),

    /// The string is not a digest of the configured algorithm.
    #[error("invalid digest: {0:?}")]
    InvalidDigest(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The layout descriptor could not be read or written.
    #[error("layout descriptor error: {0}")]
    Descriptor(String),

    /// The store lock is poisoned.
    #[error("binary store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for binary store operations.
pub type BinaryResult<T> = Result<T, BinaryError>;
