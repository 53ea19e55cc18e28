/// Errors from digest and layout configuration.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid pairtree layout: {0}")]
    InvalidLayout(String),
}
