use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("layout error: {0}")]
    Layout(#[from] lake_layout::LayoutError),

    #[error("graph store error: {0}")]
    Graph(#[from] lake_graph::GraphError),

    #[error("binary store error: {0}")]
    Binary(#[from] lake_binary::BinaryError),

    #[error("messaging error: {0}")]
    Messaging(#[from] lake_messaging::MessagingError),

    #[error("parse error: {0}")]
    Parse(#[from] lake_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Returns `true` if the store must be migrated before it can be opened
    /// with the current configuration.
    pub fn is_migration_required(&self) -> bool {
        matches!(
            self,
            Self::Layout(lake_layout::LayoutError::MigrationRequired(_))
                | Self::Binary(lake_binary::BinaryError::MigrationRequired(_))
        )
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
