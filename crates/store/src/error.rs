use thiserror::Error;

/// Errors that can occur when interacting with the repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row being updated does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
