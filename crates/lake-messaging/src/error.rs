/// Errors from event formatting and delivery.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// A route names a handler the registry does not know.
    #[error("unknown message handler: {0}")]
    UnknownHandler(String),

    /// A route names a formatter that does not exist.
    #[error("unknown formatter: {0}")]
    UnknownFormatter(String),

    /// A route is missing a setting its handler needs.
    #[error("invalid route for handler {handler}: {reason}")]
    InvalidRoute { handler: String, reason: String },

    /// A handler failed to deliver a payload.
    #[error("delivery through {handler} failed: {reason}")]
    Delivery { handler: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;
